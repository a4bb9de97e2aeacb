//! Source file discovery and path normalization.
//!
//! Query extraction only looks at script sources: `*.js`, `*.jsx`, `*.ts`
//! and `*.tsx`, skipping `node_modules` and type declaration files.

use chrono::{DateTime, Local};
use std::{
    env, fs, io,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// Extensions scanned for queries.
const SOURCE_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx"];

/// A source file read from disk.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Normalized absolute path.
    pub path: PathBuf,
    pub text: String,
    pub read_at: DateTime<Local>,
}

impl SourceFile {
    /// Read a file, normalizing its path.
    pub fn read(path: &Path) -> io::Result<Self> {
        let path = normalize_path(path);
        let text = fs::read_to_string(&path)?;
        Ok(Self {
            path,
            text,
            read_at: Local::now(),
        })
    }
}

/// Normalize a path to absolute form for reliable comparison.
///
/// Config paths are already canonicalized, so incoming paths (e.g., from the
/// file watcher) are canonicalized before comparison.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        }
    })
}

/// Render a path with forward slashes.
///
/// Page cache keys hash this string, so build-time writers and page
/// components must go through the same conversion.
pub fn path_key(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Check whether a path is a script source that may contain queries.
pub fn is_source_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if name.ends_with(".d.ts") {
        return false;
    }
    if path.components().any(|c| c.as_os_str() == "node_modules") {
        return false;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}

/// Check if path is a temp/backup file (editor artifacts).
pub fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// Collect every source file below `dir`, sorted for a stable batch order.
pub fn collect_source_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<_> = WalkDir::new(dir)
        .into_iter()
        .filter_entry(|e| e.file_name() != "node_modules")
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| normalize_path(e.path()))
        .filter(|p| is_source_file(p))
        .collect();
    files.sort();
    files
}
