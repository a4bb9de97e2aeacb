//! `[query]` and `[fragments]` section configuration.
//!
//! Contains the query engine command, dataset location, join options and
//! the fragments entry.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[query]` section in groq.toml - evaluation and join rewriting.
///
/// # Example
/// ```toml
/// [query]
/// match_field = "_id"
/// auto_refs = true
/// engine = ["groq", "--input", "ndjson"]
/// dataset = "content/dataset.ndjson"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct QueryConfig {
    /// Field of the referenced node compared against a reference value.
    #[serde(default = "defaults::query::match_field")]
    #[educe(Default = defaults::query::match_field())]
    pub match_field: String,

    /// Append `._ref` to dereferenced fields.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub auto_refs: bool,

    /// Command evaluating a query; the query text is passed as the last argument
    /// and the dataset as NDJSON on stdin.
    #[serde(default = "defaults::query::engine")]
    #[educe(Default = defaults::query::engine())]
    pub engine: Vec<String>,

    /// Content nodes, either a JSON array or NDJSON.
    #[serde(default = "defaults::query::dataset")]
    #[educe(Default = defaults::query::dataset())]
    pub dataset: PathBuf,
}

/// `[fragments]` section in groq.toml - reusable query snippets.
///
/// # Example
/// ```toml
/// [fragments]
/// dir = "src/fragments"
/// entry = "index.toml"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct FragmentsConfig {
    /// Fragments root; any change below it reloads the index.
    #[serde(default = "defaults::fragments::dir")]
    #[educe(Default = defaults::fragments::dir())]
    pub dir: Option<PathBuf>,

    /// Entry file inside `dir` (`.toml` or `.json`) mapping names to snippets.
    #[serde(default = "defaults::fragments::entry")]
    #[educe(Default = defaults::fragments::entry())]
    pub entry: PathBuf,
}
