//! Page context substitution.
//!
//! Each context key `k` replaces every `$k` token in a page query with a
//! JSON-quoted literal. A token only matches when the key is not followed by
//! another identifier character, so `$slug` never touches `$slugPrefix`.

use crate::error::{PipelineError, PipelineResult};
use regex::{NoExpand, Regex};
use serde_json::{Map, Value};

/// Quoted literal for one context value, or the kind name when it cannot be inlined.
fn literal(value: &Value) -> Result<String, &'static str> {
    match value {
        Value::String(_) => Ok(value.to_string()),
        Value::Number(n) => Ok(format!("\"{n}\"")),
        Value::Bool(b) => Ok(format!("\"{b}\"")),
        Value::Null => Err("a null"),
        Value::Array(_) => Err("an array"),
        Value::Object(_) => Err("an object"),
    }
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Substitute `$key` tokens with values from the page context.
///
/// Keys that never occur are ignored whatever their value. Keys that are not
/// identifiers cannot appear as tokens and are skipped.
pub fn substitute_context(raw: &str, context: &Map<String, Value>) -> PipelineResult<String> {
    let mut query = raw.to_owned();
    for (key, value) in context {
        if !is_identifier(key) || !query.contains(&format!("${key}")) {
            continue;
        }

        // `key` is a plain identifier, so the pattern needs no escaping.
        let Ok(token) = Regex::new(&format!(r"\${key}\b")) else {
            continue;
        };
        if !token.is_match(&query) {
            continue;
        }

        let literal = literal(value).map_err(|kind| PipelineError::Substitution {
            key: key.clone(),
            kind,
        })?;
        query = token.replace_all(&query, NoExpand(&literal)).into_owned();
    }
    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_string_value() {
        let ctx = context(json!({ "slug": "hello" }));
        assert_eq!(
            substitute_context("*[slug.current == $slug]", &ctx).unwrap(),
            r#"*[slug.current == "hello"]"#
        );
    }

    #[test]
    fn test_string_value_is_json_escaped() {
        let ctx = context(json!({ "title": "say \"hi\"" }));
        assert_eq!(
            substitute_context("*[title == $title]", &ctx).unwrap(),
            r#"*[title == "say \"hi\""]"#
        );
    }

    #[test]
    fn test_numbers_and_booleans_are_quoted() {
        let ctx = context(json!({ "page": 2, "draft": false }));
        assert_eq!(
            substitute_context("*[page == $page && draft == $draft]", &ctx).unwrap(),
            r#"*[page == "2" && draft == "false"]"#
        );
    }

    #[test]
    fn test_every_occurrence_replaced() {
        let ctx = context(json!({ "id": "a" }));
        assert_eq!(
            substitute_context("*[_id == $id || ref == $id]", &ctx).unwrap(),
            r#"*[_id == "a" || ref == "a"]"#
        );
    }

    #[test]
    fn test_longer_token_untouched() {
        let ctx = context(json!({ "slug": "a", "slugPrefix": "b" }));
        assert_eq!(
            substitute_context("[$slugPrefix, $slug]", &ctx).unwrap(),
            r#"["b", "a"]"#
        );
    }

    #[test]
    fn test_dollar_in_value_not_expanded() {
        let ctx = context(json!({ "price": "$1" }));
        assert_eq!(
            substitute_context("*[price == $price]", &ctx).unwrap(),
            r#"*[price == "$1"]"#
        );
    }

    #[test]
    fn test_unused_complex_value_ignored() {
        let ctx = context(json!({ "slug": "a", "data": { "title": "x" } }));
        assert_eq!(
            substitute_context("*[slug.current == $slug]", &ctx).unwrap(),
            r#"*[slug.current == "a"]"#
        );
    }

    #[test]
    fn test_used_complex_value_fails() {
        let ctx = context(json!({ "tags": ["a", "b"] }));
        let err = substitute_context("*[tag in $tags]", &ctx).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Substitution { ref key, kind: "an array" } if key == "tags"
        ));

        let ctx = context(json!({ "parent": null }));
        assert!(substitute_context("*[_id == $parent]", &ctx).is_err());
    }
}
