//! Project configuration management for `groq.toml`.
//!
//! # Sections
//!
//! | Section       | Purpose                                          |
//! |---------------|--------------------------------------------------|
//! | `[build]`     | Source dir, build mode, cache roots, babel config |
//! | `[query]`     | Engine command, dataset, join options            |
//! | `[fragments]` | Fragment snippets directory and entry file       |
//! | `[pages]`     | Page registry manifest                           |
//!
//! # Example
//!
//! ```toml
//! [build]
//! src = "src"
//! mode = "development"
//!
//! [query]
//! match_field = "id"
//! dataset = "content/dataset.ndjson"
//!
//! [fragments]
//! dir = "src/fragments"
//!
//! [pages]
//! manifest = ".cache/pages.json"
//! ```

mod build;
pub mod defaults;
mod error;
mod query;

pub use build::{BuildConfig, BuildMode};
pub use error::ConfigError;
pub use query::{FragmentsConfig, QueryConfig};

use crate::cli::Cli;
use crate::utils::files::normalize_path;
use anyhow::{Context, Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// `[pages]` section in groq.toml - page registry manifest.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct PagesConfig {
    /// JSON array of `{ path, component, context }` entries.
    #[serde(default = "defaults::pages::manifest")]
    #[educe(Default = defaults::pages::manifest())]
    pub manifest: PathBuf,
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing groq.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub fragments: FragmentsConfig,

    #[serde(default)]
    pub pages: PagesConfig,
}

impl ProjectConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        Self::parse(content, Path::new("groq.toml"))
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self> {
        let config = toml::from_str(content).map_err(|e| ConfigError::Toml(path.to_path_buf(), e))?;
        Ok(config)
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        self.build.root.as_deref().unwrap_or(Path::new("./"))
    }

    /// Set the root directory path
    pub fn set_root(&mut self, path: &Path) {
        self.build.root = Some(path.to_path_buf());
    }

    /// Cache root for the active build mode.
    pub fn cache_root(&self) -> &Path {
        match self.build.mode {
            BuildMode::Development => &self.build.cache_dev,
            BuildMode::Production => &self.build.cache_prod,
        }
    }

    /// Absolute path of the fragments entry file, if fragments are configured.
    pub fn fragments_entry(&self) -> Option<PathBuf> {
        self.fragments
            .dir
            .as_ref()
            .map(|dir| dir.join(&self.fragments.entry))
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &Cli) {
        let root = cli
            .root
            .clone()
            .unwrap_or_else(|| self.get_root().to_owned());

        Self::update_option(&mut self.build.src, cli.src.as_ref());
        Self::update_option(&mut self.build.mode, cli.build_args().mode.as_ref());

        self.update_path_with_root(&root);
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Update all paths relative to root directory and normalize to absolute paths
    pub fn update_path_with_root(&mut self, root: &Path) {
        let root = normalize_path(root);
        self.set_root(&root);

        let resolve = |path: &Path| {
            let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
            normalize_path(&root.join(expanded))
        };

        self.build.src = resolve(&self.build.src);
        self.build.cache_dev = resolve(&self.build.cache_dev);
        self.build.cache_prod = resolve(&self.build.cache_prod);
        self.build.babelrc = resolve(&self.build.babelrc);
        self.query.dataset = resolve(&self.query.dataset);
        self.pages.manifest = resolve(&self.pages.manifest);
        self.fragments.dir = self.fragments.dir.as_deref().map(resolve);
    }

    /// Validate configuration before extracting.
    pub fn validate(&self) -> Result<()> {
        if !self.build.src.is_dir() {
            bail!(ConfigError::invalid(
                "build.src",
                format!("`{}` is not a directory", self.build.src.display())
            ));
        }

        if self.query.match_field.trim().is_empty() {
            bail!(ConfigError::invalid("query.match_field", "must not be empty"));
        }

        Self::check_command_installed("query.engine", &self.query.engine)?;

        if let Some(entry) = self.fragments_entry()
            && !entry.is_file()
        {
            bail!(ConfigError::invalid(
                "fragments.entry",
                format!("`{}` not found", entry.display())
            ));
        }

        Ok(())
    }

    /// Check if a command is installed and available
    fn check_command_installed(field: &'static str, command: &[String]) -> Result<()> {
        let Some(cmd) = command.first() else {
            bail!(ConfigError::invalid(field, "must have at least one element"));
        };

        which::which(cmd)
            .with_context(|| format!("`{cmd}` not found. Please install it first."))?;

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
