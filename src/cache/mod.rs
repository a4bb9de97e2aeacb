//! Content-addressed query cache.
//!
//! Every entry is one JSON file named after a 64-bit key:
//!
//! | Kind   | Key input                         | Payload                          |
//! |--------|-----------------------------------|----------------------------------|
//! | Page   | normalized source file path       | `{"unprocessed": "<raw text>"}`  |
//! | Static | rewritten query (fragments+joins) | evaluated result                 |
//!
//! The two derivations are kept apart on purpose: page entries are looked up
//! by component path, static entries by the query text the caller computed.

pub mod lookup;

use crate::error::{PipelineError, PipelineResult};
use crate::extract::QueryKind;
use crate::log;
use crate::rewrite::JoinOptions;
use crate::utils::files::path_key;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    fmt, fs,
    path::{Path, PathBuf},
};
use xxhash_rust::xxh3::xxh3_64;

/// Join options artifact, next to the entries.
pub const OPTIONS_FILE: &str = "options.json";

/// Cache file name for a query or path digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey(u64);

impl CacheKey {
    /// Key of the page entry for a source file.
    pub fn for_page(path: &Path) -> Self {
        Self(xxh3_64(path_key(path).as_bytes()))
    }

    /// Key of a static entry for its final rewritten text.
    pub fn for_static(query: &str) -> Self {
        Self(xxh3_64(query.as_bytes()))
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    pub fn file_name(self) -> String {
        format!("{self}.json")
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0.to_be_bytes()))
    }
}

/// Stored form of a page query: raw, pre-substitution text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageEntry {
    pub unprocessed: String,
}

/// The cache directory for one build mode.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entry_path(&self, key: CacheKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    /// Remove every entry and recreate an empty root.
    pub fn reset(&self) -> PipelineResult<()> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root)
                .map_err(|e| PipelineError::CacheWrite(self.root.clone(), e))?;
        }
        fs::create_dir_all(&self.root).map_err(|e| PipelineError::CacheWrite(self.root.clone(), e))
    }

    /// Write a payload under the key derived from `input`, replacing any previous entry.
    pub fn put(&self, kind: QueryKind, input: &str, payload: &Value) -> PipelineResult<PathBuf> {
        let key = match kind {
            QueryKind::Page => CacheKey::for_page(Path::new(input)),
            QueryKind::Static => CacheKey::for_static(input),
        };
        let path = self.entry_path(key);
        self.write_json(&path, payload)?;
        log!("cache"; "{} entry {key}", kind.name());
        Ok(path)
    }

    pub fn put_page(&self, source: &Path, raw: &str) -> PipelineResult<PathBuf> {
        let payload = serde_json::json!({ "unprocessed": raw });
        self.put(QueryKind::Page, &path_key(source), &payload)
    }

    pub fn put_static(&self, query: &str, result: &Value) -> PipelineResult<PathBuf> {
        self.put(QueryKind::Static, query, result)
    }

    pub fn write_options(&self, options: &JoinOptions) -> PipelineResult<PathBuf> {
        let path = self.root.join(OPTIONS_FILE);
        let payload =
            serde_json::to_value(options).map_err(|e| PipelineError::CacheWrite(path.clone(), e.into()))?;
        self.write_json(&path, &payload)?;
        Ok(path)
    }

    /// Join options artifact; defaults when absent or unreadable.
    pub fn options(&self) -> JoinOptions {
        let path = self.root.join(OPTIONS_FILE);
        let Ok(content) = fs::read_to_string(&path) else {
            return JoinOptions::default();
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            log!("warn"; "ignoring `{}`: {e}", path.display());
            JoinOptions::default()
        })
    }

    /// Page entry for a component, if one was cached.
    pub fn read_page_entry(&self, component: &Path) -> Option<PageEntry> {
        let content = fs::read_to_string(self.entry_path(CacheKey::for_page(component))).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Static entry for a rewritten query.
    pub fn read_static(&self, query: &str) -> Option<Value> {
        let content = fs::read_to_string(self.entry_path(CacheKey::for_static(query))).ok()?;
        serde_json::from_str(&content).ok()
    }

    fn write_json(&self, path: &Path, payload: &Value) -> PipelineResult<()> {
        let content = serde_json::to_string(payload)
            .map_err(|e| PipelineError::CacheWrite(path.to_path_buf(), e.into()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| PipelineError::CacheWrite(parent.to_path_buf(), e))?;
        }
        fs::write(path, content).map_err(|e| PipelineError::CacheWrite(path.to_path_buf(), e))
    }
}
