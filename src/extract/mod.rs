//! Query extraction from parsed sources.
//!
//! Two stages per file:
//!
//! ```text
//! text ──► marker pre-check ──► parse ──► full tree walk ──► QuerySpan per kind
//!          (substring test)     (only if a marker matched)   (last match wins)
//! ```
//!
//! Spans are byte-exact slices of the original text, so later literal
//! substitution works against what the author wrote, comments included.

mod parser;

pub use parser::{ParseOptions, SourceParser};

use crate::error::PipelineResult;
use crate::utils::files::SourceFile;
use std::{
    ops::Range,
    path::{Path, PathBuf},
};
use tree_sitter::{Node, Tree};

/// Pre-check marker for page queries.
pub const PAGE_QUERY_MARKER: &str = "export const groqQuery = ";
/// Pre-check marker for static queries.
pub const STATIC_QUERY_MARKER: &str = "useGroqQuery";

/// Exported binding holding a page query.
const PAGE_QUERY_BINDING: &str = "groqQuery";
/// Hook whose first argument is a static query.
const STATIC_QUERY_HOOK: &str = "useGroqQuery";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Exported `groqQuery`, evaluated per page with page context.
    Page,
    /// `useGroqQuery(...)` argument, evaluated once at build time.
    Static,
}

impl QueryKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Static => "static",
        }
    }
}

/// One extracted query occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpan {
    pub kind: QueryKind,
    pub path: PathBuf,
    /// Exact source text, `text[start..end]`.
    pub raw: String,
    pub start: usize,
    pub end: usize,
}

/// At most one span of each kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub page: Option<QuerySpan>,
    pub statics: Option<QuerySpan>,
}

impl Extraction {
    pub const fn is_empty(&self) -> bool {
        self.page.is_none() && self.statics.is_none()
    }
}

#[inline]
pub fn has_page_marker(text: &str) -> bool {
    text.contains(PAGE_QUERY_MARKER)
}

#[inline]
pub fn has_static_marker(text: &str) -> bool {
    text.contains(STATIC_QUERY_MARKER)
}

/// Extract page and static queries from a source file.
///
/// Files without either marker are never parsed.
pub fn extract(parser: &SourceParser, file: &SourceFile) -> PipelineResult<Extraction> {
    let want_page = has_page_marker(&file.text);
    let want_static = has_static_marker(&file.text);
    if !want_page && !want_static {
        return Ok(Extraction::default());
    }

    let tree = parser.parse(&file.path, &file.text)?;
    let mut extraction = extract_from_tree(&tree, &file.text, &file.path);
    if !want_page {
        extraction.page = None;
    }
    if !want_static {
        extraction.statics = None;
    }
    Ok(extraction)
}

/// Walk the whole tree in document order, keeping the last match per kind.
pub fn extract_from_tree(tree: &Tree, text: &str, path: &Path) -> Extraction {
    let mut page = None;
    let mut statics = None;

    let mut cursor = tree.walk();
    'walk: loop {
        let node = cursor.node();
        match node.kind() {
            "export_statement" => {
                if let Some(range) = page_query_range(node, text) {
                    page = Some(range);
                }
            }
            "call_expression" => {
                if let Some(range) = static_query_range(node, text) {
                    statics = Some(range);
                }
            }
            _ => {}
        }

        if cursor.goto_first_child() {
            continue;
        }
        while !cursor.goto_next_sibling() {
            if !cursor.goto_parent() {
                break 'walk;
            }
        }
    }

    let span = |kind, range: Range<usize>| QuerySpan {
        kind,
        path: path.to_path_buf(),
        raw: text[range.clone()].to_owned(),
        start: range.start,
        end: range.end,
    };

    Extraction {
        page: page.map(|r| span(QueryKind::Page, r)),
        statics: statics.map(|r| span(QueryKind::Static, r)),
    }
}

/// Initializer range of an exported `groqQuery` declarator.
fn page_query_range(export: Node, text: &str) -> Option<Range<usize>> {
    let declaration = export.child_by_field_name("declaration")?;
    if !matches!(
        declaration.kind(),
        "lexical_declaration" | "variable_declaration"
    ) {
        return None;
    }

    let mut cursor = declaration.walk();
    let mut found = None;
    for declarator in declaration.named_children(&mut cursor) {
        if declarator.kind() != "variable_declarator" {
            continue;
        }
        let is_query = declarator
            .child_by_field_name("name")
            .is_some_and(|name| &text[name.byte_range()] == PAGE_QUERY_BINDING);
        if let Some(value) = declarator.child_by_field_name("value")
            && is_query
        {
            found = Some(value.byte_range());
        }
    }
    found
}

/// First argument of a `useGroqQuery(...)` call, one delimiter trimmed from each end.
fn static_query_range(call: Node, text: &str) -> Option<Range<usize>> {
    let callee = call.child_by_field_name("function")?;
    if callee.kind() != "identifier" || &text[callee.byte_range()] != STATIC_QUERY_HOOK {
        return None;
    }

    let arguments = call.child_by_field_name("arguments")?;
    let mut cursor = arguments.walk();
    let first = arguments
        .named_children(&mut cursor)
        .find(|arg| arg.kind() != "comment")?;

    let range = first.byte_range();
    if range.len() < 2 {
        return None;
    }
    let trimmed = range.start + 1..range.end - 1;
    // Keep the slice on char boundaries when the argument is not a plain literal.
    (text.is_char_boundary(trimmed.start) && text.is_char_boundary(trimmed.end)).then_some(trimmed)
}
