//! Source parsing with tree-sitter.
//!
//! Parse options mirror a babel plugin list: a fixed base set plus string
//! plugins taken from the host project's `.babelrc`. The plugin list only
//! selects the grammar; tree-sitter grammars already accept the syntax most
//! babel proposal plugins enable.

use crate::error::{PipelineError, PipelineResult};
use crate::log;
use serde::Deserialize;
use std::{fs, path::Path};
use tree_sitter::{Language, Parser, Tree};

/// Plugins every parse starts with.
const BASE_PLUGINS: &[&str] = &["jsx"];

/// Plugin list handed to the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    pub plugins: Vec<String>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            plugins: BASE_PLUGINS.iter().map(|p| (*p).to_owned()).collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct BabelConfig {
    #[serde(default)]
    plugins: Vec<serde_json::Value>,
}

impl ParseOptions {
    /// Base plugins extended by a `.babelrc`, if one exists.
    ///
    /// A malformed `.babelrc` is reported and ignored.
    pub fn from_babelrc(path: &Path) -> Self {
        let mut options = Self::default();
        let Ok(content) = fs::read_to_string(path) else {
            return options;
        };

        match serde_json::from_str::<BabelConfig>(&content) {
            Ok(babel) => options.extend_from_babel(&babel),
            Err(e) => log!("warn"; "ignoring `{}`: {e}", path.display()),
        }
        options
    }

    /// Only string entries from `@babel` are taken; array entries carry
    /// plugin options and are skipped.
    fn extend_from_babel(&mut self, babel: &BabelConfig) {
        for plugin in babel.plugins.iter().filter_map(|p| p.as_str()) {
            if !plugin.starts_with("@babel") {
                continue;
            }
            let handle = plugin
                .replace("@babel/plugin-", "")
                .replace("proposal-", "");
            let handle = camel_case(&handle);
            if !self.plugins.contains(&handle) {
                self.plugins.push(handle);
            }
        }
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins.iter().any(|p| p == name)
    }

    /// Grammar for a file: by extension first, then by the `typescript` plugin.
    fn language_for(&self, path: &Path) -> Language {
        match path.extension().and_then(|e| e.to_str()) {
            Some("ts") => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Some("tsx") => tree_sitter_typescript::LANGUAGE_TSX.into(),
            _ if self.has_plugin("typescript") => tree_sitter_typescript::LANGUAGE_TSX.into(),
            _ => tree_sitter_javascript::LANGUAGE.into(),
        }
    }
}

/// `class-properties` → `classProperties`
fn camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut upper = false;
    for c in s.chars() {
        if matches!(c, '-' | '_' | ' ' | '.') {
            upper = !out.is_empty();
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else if out.is_empty() {
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Syntax-tree provider for source files.
#[derive(Debug, Clone, Default)]
pub struct SourceParser {
    options: ParseOptions,
}

impl SourceParser {
    pub const fn new(options: ParseOptions) -> Self {
        Self { options }
    }

    pub const fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Parse `text` into a tree with byte offsets.
    ///
    /// Syntax errors are recovered inside the tree; only a parser that cannot
    /// be set up or produce a tree is a failure.
    pub fn parse(&self, path: &Path, text: &str) -> PipelineResult<Tree> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.options.language_for(path))
            .map_err(|_| PipelineError::Parse(path.to_path_buf()))?;

        let tree = parser
            .parse(text, None)
            .ok_or_else(|| PipelineError::Parse(path.to_path_buf()))?;

        if tree.root_node().has_error() {
            log!("warn"; "syntax errors in `{}`, extracting from recovered tree", path.display());
        }
        Ok(tree)
    }
}
