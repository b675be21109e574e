//! Symbolic comparison keywords (`eq`, `gt`, `heq`, ...) inside directive
//! expressions, rewritten to their operators before parsing.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

const KEYWORDS: [(&str, &str); 8] = [
    ("eq", "=="),
    ("neq", "!="),
    ("gt", ">"),
    ("egt", ">="),
    ("lt", "<"),
    ("elt", "<="),
    ("heq", "==="),
    ("nheq", "!=="),
];

// Longest keywords first so `heq` is never shadowed by `eq`.
static PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let mut keys: Vec<&str> = KEYWORDS.iter().map(|(k, _)| *k).collect();
    keys.sort_by(|a, b| b.len().cmp(&a.len()));
    let alternation = keys
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"\b({alternation})\b")).expect("keyword alternation is a valid pattern")
});

/// Rewrites whole-word comparison keywords to operators. Input without any
/// keyword is returned borrowed and unchanged.
pub fn translate(expr: &str) -> Cow<'_, str> {
    PATTERN.replace_all(expr, |caps: &Captures| operator_for(&caps[1]).to_string())
}

fn operator_for(keyword: &str) -> &'static str {
    KEYWORDS
        .iter()
        .find(|(k, _)| *k == keyword)
        .map(|(_, op)| *op)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_simple_keywords() {
        assert_eq!(translate("a eq b"), "a == b");
        assert_eq!(translate("a neq b"), "a != b");
        assert_eq!(translate("i lt 3"), "i < 3");
        assert_eq!(translate("i elt 3 && j egt 1"), "i <= 3 && j >= 1");
    }

    #[test]
    fn longer_keywords_win() {
        assert_eq!(translate("a heq b"), "a === b");
        assert_eq!(translate("a nheq b"), "a !== b");
    }

    #[test]
    fn identifiers_containing_keywords_are_untouched() {
        assert_eq!(translate("freq gt 2"), "freq > 2");
        assert_eq!(translate("equal"), "equal");
        assert!(matches!(translate("items.length"), Cow::Borrowed(_)));
    }

    #[test]
    fn for_header_is_translated_in_place() {
        assert_eq!(translate("let i = 0; i lt n; i++"), "let i = 0; i < n; i++");
    }
}
