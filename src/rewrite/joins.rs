//! Dereference shorthand rewriting.
//!
//! `author->` becomes an explicit sub-selection against the dataset:
//!
//! | Input          | Output (`matchField = "id"`)         |
//! |----------------|--------------------------------------|
//! | `author->`     | `*[ id == ^.author ][0]`             |
//! | `tags[]->`     | `*[ id in ^.tags ]`                  |
//! | `author->name` | `*[ id == ^.author ][0].name`        |
//! | `image.asset->`| unchanged (resolved by the engine)   |

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, sync::LazyLock};

/// Dereference token.
pub const JOIN_ARROW: &str = "->";

/// Reference field the query engine resolves natively.
const RESERVED_REFERENCE_FIELD: &str = "asset";

/// Array marker inside a field path.
const ARRAY_MARKER: &str = "[]";

/// A field path directly followed by `->` and an optional attribute.
///
/// `lead` keeps matches from starting inside a longer path such as `^.author->`.
static JOIN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?P<lead>^|[^\w.\]^$])(?P<field>[A-Za-z_]\w*(?:\[\])?(?:\.[A-Za-z_]\w*(?:\[\])?)*)->(?P<attr>\w*)",
    )
    .expect("join pattern is valid")
});

/// Join options artifact (`options.json` in the cache root).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinOptions {
    /// Field on the referenced node matched against the reference.
    #[serde(default = "default_match_field", alias = "referenceMatcher")]
    pub match_field: String,

    /// Append `._ref` to the referencing field.
    #[serde(default)]
    pub auto_refs: bool,
}

fn default_match_field() -> String {
    "id".into()
}

impl Default for JoinOptions {
    fn default() -> Self {
        Self {
            match_field: default_match_field(),
            auto_refs: false,
        }
    }
}

#[inline]
pub fn has_joins(text: &str) -> bool {
    text.contains(JOIN_ARROW)
}

/// Rewrite every dereference shorthand, left to right.
pub fn rewrite_joins<'a>(text: &'a str, options: &JoinOptions) -> Cow<'a, str> {
    if !has_joins(text) {
        return Cow::Borrowed(text);
    }

    JOIN_PATTERN.replace_all(text, |caps: &Captures| {
        let field = &caps["field"];
        let base = field.replace(ARRAY_MARKER, "");

        let reserved = base
            .rsplit('.')
            .next()
            .is_some_and(|last| last == RESERVED_REFERENCE_FIELD);
        if reserved {
            return caps[0].to_owned();
        }

        let is_array = field.contains(ARRAY_MARKER);
        let matcher = &options.match_field;
        let mut replacement = match (is_array, options.auto_refs) {
            (false, false) => format!("*[ {matcher} == ^.{base} ][0]"),
            (false, true) => format!("*[ {matcher} == ^.{base}._ref ][0]"),
            (true, false) => format!("*[ {matcher} in ^.{base} ]"),
            (true, true) => format!("*[ {matcher} in ^.{base}[]._ref ]"),
        };

        let attr = &caps["attr"];
        if !attr.is_empty() {
            replacement.push('.');
            replacement.push_str(attr);
        }

        format!("{}{replacement}", &caps["lead"])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id_options() -> JoinOptions {
        JoinOptions {
            match_field: "id".into(),
            auto_refs: false,
        }
    }

    #[test]
    fn test_single_reference() {
        assert_eq!(
            rewrite_joins(r#"*[_type=="post"]{author->}"#, &id_options()),
            r#"*[_type=="post"]{*[ id == ^.author ][0]}"#
        );
    }

    #[test]
    fn test_array_reference() {
        assert_eq!(
            rewrite_joins(r#"*[_type=="post"]{tags[]->}"#, &id_options()),
            r#"*[_type=="post"]{*[ id in ^.tags ]}"#
        );
    }

    #[test]
    fn test_asset_reference_untouched() {
        let text = r#"*[_type=="post"]{ "url": image.asset->url }"#;
        assert_eq!(rewrite_joins(text, &id_options()), text);

        let text = "*{ asset-> }";
        assert_eq!(rewrite_joins(text, &id_options()), text);
    }

    #[test]
    fn test_nested_path_and_attribute() {
        assert_eq!(
            rewrite_joins(r#"*{ "name": post.author->name }"#, &id_options()),
            r#"*{ "name": *[ id == ^.post.author ][0].name }"#
        );
    }

    #[test]
    fn test_auto_refs() {
        let options = JoinOptions {
            match_field: "_id".into(),
            auto_refs: true,
        };
        assert_eq!(
            rewrite_joins("*{author->, tags[]->}", &options),
            "*{*[ _id == ^.author._ref ][0], *[ _id in ^.tags[]._ref ]}"
        );
    }

    #[test]
    fn test_every_match_rewritten_left_to_right() {
        assert_eq!(
            rewrite_joins("*{a->, b->, image.asset->, c[]->}", &id_options()),
            "*{*[ id == ^.a ][0], *[ id == ^.b ][0], image.asset->, *[ id in ^.c ]}"
        );
    }

    #[test]
    fn test_reference_inside_filter() {
        assert_eq!(
            rewrite_joins(r#"*[author->name == "bob"]"#, &id_options()),
            r#"*[*[ id == ^.author ][0].name == "bob"]"#
        );
    }

    #[test]
    fn test_parent_scope_path_not_split() {
        let text = "*{ ^.author-> }";
        assert_eq!(rewrite_joins(text, &id_options()), text);
    }

    #[test]
    fn test_no_arrow_is_noop() {
        let text = r#"*[_type == "post"]{title}"#;
        assert!(matches!(rewrite_joins(text, &id_options()), Cow::Borrowed(_)));
    }

    #[test]
    fn test_options_artifact_names() {
        let options: JoinOptions =
            serde_json::from_str(r#"{ "matchField": "_id", "autoRefs": true }"#).unwrap();
        assert_eq!(options.match_field, "_id");
        assert!(options.auto_refs);

        let legacy: JoinOptions =
            serde_json::from_str(r#"{ "referenceMatcher": "slug" }"#).unwrap();
        assert_eq!(legacy.match_field, "slug");
        assert!(!legacy.auto_refs);

        let empty: JoinOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, JoinOptions::default());
    }
}
