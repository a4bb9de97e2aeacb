//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// Common Defaults
// ============================================================================

pub fn r#false() -> bool {
    false
}

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use std::path::PathBuf;

    pub fn root() -> Option<PathBuf> {
        None
    }

    pub fn src() -> PathBuf {
        "src".into()
    }

    pub fn cache_dev() -> PathBuf {
        ".cache/groq".into()
    }

    pub fn cache_prod() -> PathBuf {
        "public/static/groq".into()
    }

    pub fn babelrc() -> PathBuf {
        ".babelrc".into()
    }
}

// ============================================================================
// [query] Section Defaults
// ============================================================================

pub mod query {
    use std::path::PathBuf;

    pub fn match_field() -> String {
        "id".into()
    }

    pub fn engine() -> Vec<String> {
        vec!["groq".into(), "--input".into(), "ndjson".into()]
    }

    pub fn dataset() -> PathBuf {
        "content/dataset.ndjson".into()
    }
}

// ============================================================================
// [fragments] Section Defaults
// ============================================================================

pub mod fragments {
    use std::path::PathBuf;

    pub fn dir() -> Option<PathBuf> {
        None
    }

    pub fn entry() -> PathBuf {
        "index.toml".into()
    }
}

// ============================================================================
// [pages] Section Defaults
// ============================================================================

pub mod pages {
    use std::path::PathBuf;

    pub fn manifest() -> PathBuf {
        ".cache/pages.json".into()
    }
}
