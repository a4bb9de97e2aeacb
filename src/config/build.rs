//! `[build]` section configuration.
//!
//! Contains source/cache locations and the build mode that selects the cache root.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Build mode, selects which cache root query results are written to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Local development, results live under `.cache/groq`.
    #[default]
    Development,
    /// Static output, results are shipped with the site under `public/static/groq`.
    Production,
}

/// `[build]` section in groq.toml.
///
/// # Example
/// ```toml
/// [build]
/// src = "src"
/// mode = "production"
/// cache_prod = "public/static/groq"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Project root directory (usually set via CLI `--root`).
    #[serde(default = "defaults::build::root")]
    #[educe(Default = defaults::build::root())]
    pub root: Option<PathBuf>,

    /// Directory scanned for source files containing queries.
    #[serde(default = "defaults::build::src")]
    #[educe(Default = defaults::build::src())]
    pub src: PathBuf,

    #[serde(default)]
    pub mode: BuildMode,

    /// Cache root used in development mode.
    #[serde(default = "defaults::build::cache_dev")]
    #[educe(Default = defaults::build::cache_dev())]
    pub cache_dev: PathBuf,

    /// Cache root used in production mode.
    #[serde(default = "defaults::build::cache_prod")]
    #[educe(Default = defaults::build::cache_prod())]
    pub cache_prod: PathBuf,

    /// Host project babel config; string plugins extend the parser plugin list.
    #[serde(default = "defaults::build::babelrc")]
    #[educe(Default = defaults::build::babelrc())]
    pub babelrc: PathBuf,
}
