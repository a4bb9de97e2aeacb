//! Run-time retrieval of cached entries.
//!
//! Callers only know the query text they wrote, so a static query that used
//! fragments or joins is stored under a key its call site cannot reproduce.
//! Such lookups miss and are reported instead of failing.

use super::CacheStore;
use crate::log;
use serde_json::Value;
use std::path::Path;

/// Result of a static query as written at its call site.
pub fn use_static_query(root: &Path, literal: &str) -> Option<Value> {
    let store = CacheStore::new(root);
    let result = store.read_static(literal);
    if result.is_none() {
        log!(
            "warn";
            "no cached result for `{literal}`, run a build first (fragments and joins change the key)"
        );
    }
    result
}
