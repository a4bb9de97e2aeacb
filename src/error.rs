//! Pipeline error taxonomy.
//!
//! Every per-file failure is isolated and reported; only [`PipelineError::CacheWrite`]
//! is fatal, because a missing entry silently breaks run-time retrieval.

use crate::engine::EngineError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error when reading `{}`", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse `{}`", .0.display())]
    Parse(PathBuf),

    #[error("query contains fragments but no fragment index is loaded")]
    FragmentResolution,

    #[error("query failed in `{path}`: {source}\n{query}")]
    Evaluation {
        path: String,
        query: String,
        #[source]
        source: EngineError,
    },

    #[error("cannot substitute `${key}` with {kind} value")]
    Substitution { key: String, kind: &'static str },

    #[error("failed to write cache entry `{}`", .0.display())]
    CacheWrite(PathBuf, #[source] std::io::Error),
}

impl PipelineError {
    /// Failures that must stop the batch or watch loop.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::CacheWrite(..))
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
