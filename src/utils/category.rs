//! File category classification for watch mode.
//!
//! | Category   | Handling                                   | Example Files            |
//! |------------|--------------------------------------------|--------------------------|
//! | Fragments  | Reload fragment index, then re-extract     | `src/fragments/*`        |
//! | Source     | Re-extract page and static queries         | `src/**/*.{js,tsx}`      |
//! | Unknown    | Ignored                                    | Files outside watched dirs |

use super::files::{is_source_file, normalize_path};
use crate::config::ProjectConfig;
use std::path::{Path, PathBuf};

/// Category of a changed file, used to route watch events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    /// Anything under the fragments directory
    Fragments,
    /// Script source under the source directory
    Source,
    /// File outside watched directories
    Unknown,
}

impl FileCategory {
    /// Get the short name for this category (used in logs)
    pub const fn name(self) -> &'static str {
        match self {
            Self::Fragments => "fragments",
            Self::Source => "source",
            Self::Unknown => "unknown",
        }
    }

    /// Directory watched for this category, if configured.
    pub fn path(self, config: &ProjectConfig) -> Option<PathBuf> {
        match self {
            Self::Fragments => config.fragments.dir.clone(),
            Self::Source => Some(config.build.src.clone()),
            Self::Unknown => None,
        }
    }
}

/// Categorize a file path to determine how a change should be handled.
///
/// Fragments take precedence: a fragments directory inside the source tree
/// still triggers a reload.
pub fn categorize_path(path: &Path, config: &ProjectConfig) -> FileCategory {
    let path = normalize_path(path);

    if config
        .fragments
        .dir
        .as_ref()
        .is_some_and(|dir| path.starts_with(dir))
    {
        FileCategory::Fragments
    } else if path.starts_with(&config.build.src) && is_source_file(&path) {
        FileCategory::Source
    } else {
        FileCategory::Unknown
    }
}
