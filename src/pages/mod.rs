//! Page registry.
//!
//! Pages are owned by the host's router; the controller only reads them and
//! republishes a page after injecting its query result. Republishing is a
//! delete followed by a create, matching how routers replace page data.

use crate::log;
use crate::utils::files::{normalize_path, path_key};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Context field the evaluated page query is written to.
pub const DATA_FIELD: &str = "data";

/// A routed page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// URL path, unique per registry.
    pub path: String,
    /// Source file rendering the page.
    pub component: PathBuf,
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl Page {
    pub fn new(path: impl Into<String>, component: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            component: component.into(),
            context: Map::new(),
        }
    }

    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = context;
        self
    }

    /// Whether this page renders `source`, comparing forward-slash paths.
    pub fn uses_component(&self, source: &Path) -> bool {
        path_key(&self.component) == path_key(source)
    }

    pub fn data(&self) -> Option<&Value> {
        self.context.get(DATA_FIELD)
    }

    pub fn set_data(&mut self, data: Value) {
        self.context.insert(DATA_FIELD.to_owned(), data);
    }
}

pub trait PageRegistry {
    /// Snapshot of every registered page.
    fn pages(&self) -> Vec<Page>;

    fn delete_page(&mut self, page: &Page) -> Result<()>;

    fn create_page(&mut self, page: Page) -> Result<()>;
}

/// Registry operation, recorded in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCall {
    Delete(String),
    Create(String),
}

/// Vector-backed registry.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    pages: Vec<Page>,
    calls: Vec<RegistryCall>,
}

impl MemoryRegistry {
    pub fn new(pages: Vec<Page>) -> Self {
        Self {
            pages,
            calls: Vec::new(),
        }
    }

    pub fn calls(&self) -> &[RegistryCall] {
        &self.calls
    }

    pub fn get(&self, path: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.path == path)
    }
}

impl PageRegistry for MemoryRegistry {
    fn pages(&self) -> Vec<Page> {
        self.pages.clone()
    }

    fn delete_page(&mut self, page: &Page) -> Result<()> {
        self.pages.retain(|p| p.path != page.path);
        self.calls.push(RegistryCall::Delete(page.path.clone()));
        Ok(())
    }

    fn create_page(&mut self, page: Page) -> Result<()> {
        self.calls.push(RegistryCall::Create(page.path.clone()));
        self.pages.retain(|p| p.path != page.path);
        self.pages.push(page);
        Ok(())
    }
}

/// Registry persisted as a JSON array of pages.
#[derive(Debug)]
pub struct ManifestRegistry {
    path: PathBuf,
    pages: Vec<Page>,
}

impl ManifestRegistry {
    /// Load the manifest; a missing file is an empty registry.
    ///
    /// Components are normalized against `root` so they compare and hash
    /// like the source paths seen during extraction.
    pub fn load(path: impl Into<PathBuf>, root: &Path) -> Result<Self> {
        let path = path.into();
        let mut pages: Vec<Page> = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read pages manifest `{}`", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid pages manifest `{}`", path.display()))?
        } else {
            Vec::new()
        };
        for page in &mut pages {
            page.component = normalize_path(&root.join(&page.component));
        }
        log!("pages"; "{} pages from `{}`", pages.len(), path.display());
        Ok(Self { path, pages })
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create `{}`", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(&self.pages)?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write pages manifest `{}`", self.path.display()))
    }
}

impl PageRegistry for ManifestRegistry {
    fn pages(&self) -> Vec<Page> {
        self.pages.clone()
    }

    fn delete_page(&mut self, page: &Page) -> Result<()> {
        self.pages.retain(|p| p.path != page.path);
        Ok(())
    }

    fn create_page(&mut self, page: Page) -> Result<()> {
        self.pages.retain(|p| p.path != page.path);
        self.pages.push(page);
        self.save()
    }
}
