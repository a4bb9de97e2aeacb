//! Query rewriting before evaluation.
//!
//! ```text
//! raw ──► expand_fragments ──► rewrite_joins ──► (cache key) ──► strip_delimiters ──► engine
//!          ${name}              field->                             backticks
//! ```
//!
//! Page queries get [`substitute_context`] applied first.

mod context;
mod fragments;
mod joins;

pub use context::substitute_context;
pub use fragments::{
    FRAGMENT_MARKER, FragmentIndex, FragmentState, FragmentStore, expand_fragments, parse_index,
};
pub use joins::{JOIN_ARROW, JoinOptions, has_joins, rewrite_joins};

use crate::error::PipelineResult;

/// Template literal delimiter kept in raw spans.
const DELIMITER: char = '`';

/// Expand fragments, then rewrite joins.
///
/// `options` is only called when the expanded text contains a join.
pub fn rewrite(
    raw: &str,
    fragments: &FragmentState,
    options: impl FnOnce() -> JoinOptions,
) -> PipelineResult<String> {
    let expanded = expand_fragments(raw, fragments)?;
    if !has_joins(&expanded) {
        return Ok(expanded.into_owned());
    }
    Ok(rewrite_joins(&expanded, &options()).into_owned())
}

/// Remove every template-literal delimiter.
pub fn strip_delimiters(text: &str) -> String {
    text.replace(DELIMITER, "")
}
