//! Fragment snippets and their expansion.
//!
//! A fragment is a named text snippet interpolated into queries as `${name}`.
//! The index lives in an owned [`FragmentStore`] that is reloaded when the
//! fragments entry changes; readers take a snapshot and always see the most
//! recent load.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │           FragmentStore (ArcSwap)            │
//! │                                              │
//! │   NotLoaded ──reload()──► Loaded(index)      │
//! │                 ▲              │             │
//! │                 └──reload()────┘             │
//! │                                              │
//! │   snapshot() ──► Arc<FragmentState>          │
//! └──────────────────────────────────────────────┘
//! ```

use crate::error::{PipelineError, PipelineResult};
use anyhow::{Context, Result, bail};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde_json::Value;
use std::{borrow::Cow, collections::BTreeMap, fs, path::Path, sync::Arc};

/// Opening of a fragment placeholder.
pub const FRAGMENT_MARKER: &str = "${";

/// Fragment name → value. Only string values are substituted.
pub type FragmentIndex = BTreeMap<String, Value>;

/// Whether fragments were ever loaded.
///
/// `Loaded` with an empty index is distinct from `NotLoaded`, but both fail
/// expansion of a query that uses a placeholder.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FragmentState {
    #[default]
    NotLoaded,
    Loaded(FragmentIndex),
}

impl FragmentState {
    pub const fn index(&self) -> Option<&FragmentIndex> {
        match self {
            Self::NotLoaded => None,
            Self::Loaded(index) => Some(index),
        }
    }
}

/// Reloadable, explicitly owned fragment index.
#[derive(Debug)]
pub struct FragmentStore {
    state: ArcSwap<FragmentState>,
    /// Hash of the last loaded entry content.
    fingerprint: Mutex<Option<blake3::Hash>>,
}

impl Default for FragmentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FragmentStore {
    pub fn new() -> Self {
        Self {
            state: ArcSwap::from_pointee(FragmentState::NotLoaded),
            fingerprint: Mutex::new(None),
        }
    }

    /// Current state. Cheap, lock-free.
    #[inline]
    pub fn snapshot(&self) -> Arc<FragmentState> {
        self.state.load_full()
    }

    /// Replace the whole index.
    pub fn replace(&self, index: FragmentIndex) {
        self.state.store(Arc::new(FragmentState::Loaded(index)));
    }

    /// Reload the index from an entry file (`.toml` or `.json`).
    ///
    /// Returns `false` when the content matches the last load.
    pub fn reload(&self, entry: &Path) -> Result<bool> {
        let content = fs::read_to_string(entry)
            .with_context(|| format!("Failed to read fragments entry `{}`", entry.display()))?;

        let hash = blake3::hash(content.as_bytes());
        let mut fingerprint = self.fingerprint.lock();
        if *fingerprint == Some(hash) && self.snapshot().index().is_some() {
            return Ok(false);
        }

        let index = parse_index(entry, &content)?;
        self.replace(index);
        *fingerprint = Some(hash);
        Ok(true)
    }
}

/// Parse a fragments entry by extension.
pub fn parse_index(entry: &Path, content: &str) -> Result<FragmentIndex> {
    let index = match entry.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(content)
            .with_context(|| format!("Invalid fragments entry `{}`", entry.display()))?,
        Some("json") => serde_json::from_str(content)
            .with_context(|| format!("Invalid fragments entry `{}`", entry.display()))?,
        _ => bail!(
            "Unsupported fragments entry `{}`, expected .toml or .json",
            entry.display()
        ),
    };
    Ok(index)
}

/// Replace every `${name}` whose name appears in the query.
///
/// Text without a placeholder is returned untouched, whatever the state.
pub fn expand_fragments<'a>(text: &'a str, state: &FragmentState) -> PipelineResult<Cow<'a, str>> {
    if !text.contains(FRAGMENT_MARKER) {
        return Ok(Cow::Borrowed(text));
    }

    let index = state
        .index()
        .filter(|index| !index.is_empty())
        .ok_or(PipelineError::FragmentResolution)?;

    let mut expanded = text.to_owned();
    for (name, value) in index {
        if !expanded.contains(name.as_str()) {
            continue;
        }
        if let Value::String(snippet) = value {
            expanded = expanded.replace(&format!("${{{name}}}"), snippet);
        }
    }
    Ok(Cow::Owned(expanded))
}
