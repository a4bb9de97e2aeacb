//! Query engine seam and the content dataset.
//!
//! The pipeline never interprets GROQ itself: a [`QueryEngine`] parses a
//! final query string and evaluates it against a [`Dataset`] of JSON nodes.
//! [`CommandEngine`] delegates both steps to an external command.

mod command;

pub use command::CommandEngine;

use anyhow::{Context, Result, bail};
use serde_json::Value;
use std::{fs, io, path::Path, process::ExitStatus, sync::Arc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid query: {0}")]
    Parse(String),

    #[error("failed to run `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("engine output is not valid JSON")]
    Output(#[from] serde_json::Error),
}

/// Parse-then-evaluate query backend.
pub trait QueryEngine {
    type Query;

    fn parse(&self, query: &str) -> Result<Self::Query, EngineError>;

    fn evaluate(&self, query: &Self::Query, dataset: &Dataset) -> Result<Value, EngineError>;
}

/// Content nodes queries run against. Clones share the same nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    nodes: Arc<Vec<Value>>,
}

impl Dataset {
    pub fn new(nodes: Vec<Value>) -> Self {
        Self {
            nodes: Arc::new(nodes),
        }
    }

    /// Load from a `.json` array or `.ndjson` lines.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read dataset `{}`", path.display()))?;

        let dataset = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            Some("ndjson" | "jsonl") => Self::from_ndjson(&content),
            _ => bail!(
                "Unsupported dataset `{}`, expected .json or .ndjson",
                path.display()
            ),
        };
        dataset.with_context(|| format!("Invalid dataset `{}`", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let nodes: Vec<Value> = serde_json::from_str(content).context("expected a JSON array")?;
        Ok(Self::new(nodes))
    }

    /// Blank lines are skipped.
    pub fn from_ndjson(content: &str) -> Result<Self> {
        let nodes = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str(line).with_context(|| format!("line {}", i + 1))
            })
            .collect::<Result<Vec<Value>>>()?;
        Ok(Self::new(nodes))
    }

    pub fn nodes(&self) -> &[Value] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// One compact JSON node per line.
    pub fn to_ndjson(&self) -> String {
        let mut out = String::new();
        for node in self.nodes.iter() {
            out.push_str(&node.to_string());
            out.push('\n');
        }
        out
    }
}


#[cfg(test)]
mod tests {
    use super::fake::FakeEngine;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_load_ndjson() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.ndjson");
        fs::write(&path, "{\"_id\":\"a\"}\n\n{\"_id\":\"b\"}\n").unwrap();

        let dataset = Dataset::load(&path).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.nodes()[1], json!({ "_id": "b" }));
        assert_eq!(dataset.to_ndjson(), "{\"_id\":\"a\"}\n{\"_id\":\"b\"}\n");
    }

    #[test]
    fn test_load_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.json");
        fs::write(&path, r#"[{ "_id": "a" }]"#).unwrap();
        assert_eq!(Dataset::load(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Dataset::load(&dir.path().join("missing.ndjson")).is_err());

        let path = dir.path().join("dataset.ndjson");
        fs::write(&path, "{\"_id\":\"a\"}\nnot json\n").unwrap();
        let err = format!("{:#}", Dataset::load(&path).unwrap_err());
        assert!(err.contains("line 2"), "{err}");

        let path = dir.path().join("dataset.csv");
        fs::write(&path, "a,b").unwrap();
        assert!(Dataset::load(&path).is_err());
    }

    #[test]
    fn test_clones_share_nodes() {
        let dataset = Dataset::new(vec![json!(1)]);
        let clone = dataset.clone();
        assert!(std::ptr::eq(dataset.nodes(), clone.nodes()));
    }

    #[test]
    fn test_fake_engine_filter() {
        let dataset = Dataset::new(vec![
            json!({ "slug": { "current": "a" }, "title": "A" }),
            json!({ "slug": { "current": "b" }, "title": "B" }),
        ]);
        let engine = FakeEngine::default();

        let query = engine.parse(r#"*[slug.current == "b"][0]"#).unwrap();
        assert_eq!(
            engine.evaluate(&query, &dataset).unwrap()["title"],
            json!("B")
        );

        let query = engine.parse("*").unwrap();
        assert_eq!(engine.evaluate(&query, &dataset).unwrap().as_array().unwrap().len(), 2);
        assert_eq!(engine.seen().len(), 2);
    }
}
