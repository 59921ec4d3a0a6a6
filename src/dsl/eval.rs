//! Evaluator for the tag expression AST.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::ast::ExpressionNode;
use super::error::{EvaluationError, MAX_DEPTH};
use crate::utils::glob_match;

/// Tags attached to one entity at evaluation time.
pub type TagSet = HashSet<String>;

/// How tag literals are compared against a tag set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchOptions {
    /// Compare literals and tags exactly (default) or after lowercasing.
    pub case_sensitive: bool,
    /// A literal ending in `:` matches any tag in that category.
    pub category_mode: bool,
    /// A literal containing `*` is a glob; the bare `*` matches everything.
    pub wildcards: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            category_mode: false,
            wildcards: false,
        }
    }
}

/// Evaluate an expression tree against a tag set.
///
/// `And` stops at the first false operand and `Or` at the first true one.
pub fn evaluate(node: &ExpressionNode, tags: &TagSet, options: &MatchOptions) -> bool {
    match node {
        ExpressionNode::AlwaysMatch => true,

        ExpressionNode::Tag { value } => literal_matches(value, tags, options),

        ExpressionNode::Not { child } => !evaluate(child, tags, options),

        ExpressionNode::And { operands } => operands.iter().all(|e| evaluate(e, tags, options)),

        ExpressionNode::Or { operands } => operands.iter().any(|e| evaluate(e, tags, options)),
    }
}

/// Like [`evaluate`], but first rejects trees deeper than [`MAX_DEPTH`].
///
/// Use this for trees that were deserialized or built by hand rather than
/// produced by the parser.
pub fn try_evaluate(
    node: &ExpressionNode,
    tags: &TagSet,
    options: &MatchOptions,
) -> Result<bool, EvaluationError> {
    check_depth(node)?;
    Ok(evaluate(node, tags, options))
}

pub(crate) fn check_depth(node: &ExpressionNode) -> Result<(), EvaluationError> {
    let depth = node.depth();
    if depth > MAX_DEPTH {
        return Err(EvaluationError::DepthExceeded {
            depth,
            limit: MAX_DEPTH,
        });
    }
    Ok(())
}

/// Tags from `tags` that satisfy a single literal.
pub fn matching_tags<'a>(
    literal: &str,
    tags: &'a TagSet,
    options: &MatchOptions,
) -> Vec<&'a str> {
    let mut out: Vec<&str> = match literal_kind(literal, options) {
        LiteralKind::Everything => tags.iter().map(String::as_str).collect(),
        kind => {
            let pattern = normalize(literal, options);
            tags.iter()
                .filter(|tag| kind.matches(&pattern, &normalize(tag, options)))
                .map(String::as_str)
                .collect()
        }
    };
    out.sort_unstable();
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LiteralKind {
    Exact,
    Category,
    Glob,
    Everything,
}

impl LiteralKind {
    fn matches(self, pattern: &str, tag: &str) -> bool {
        match self {
            LiteralKind::Exact => tag == pattern,
            LiteralKind::Category => tag.starts_with(pattern),
            LiteralKind::Glob => glob_match(pattern, tag),
            LiteralKind::Everything => true,
        }
    }
}

fn literal_kind(literal: &str, options: &MatchOptions) -> LiteralKind {
    if options.wildcards && literal == "*" {
        LiteralKind::Everything
    } else if options.category_mode && literal.ends_with(':') {
        LiteralKind::Category
    } else if options.wildcards && literal.contains('*') {
        LiteralKind::Glob
    } else {
        LiteralKind::Exact
    }
}

fn normalize<'a>(s: &'a str, options: &MatchOptions) -> std::borrow::Cow<'a, str> {
    if options.case_sensitive {
        std::borrow::Cow::Borrowed(s)
    } else {
        std::borrow::Cow::Owned(s.to_lowercase())
    }
}

/// Match one literal against a tag set.
fn literal_matches(literal: &str, tags: &TagSet, options: &MatchOptions) -> bool {
    let kind = literal_kind(literal, options);
    match kind {
        LiteralKind::Everything => true,
        // fast path: hashed lookup
        LiteralKind::Exact if options.case_sensitive => tags.contains(literal),
        _ => {
            let pattern = normalize(literal, options);
            tags.iter().any(|tag| kind.matches(&pattern, &normalize(tag, options)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parse_expression;
    use crate::utils::tag_set;

    fn eval(expr: &str, tags: &[&str]) -> bool {
        let ast = parse_expression(expr).unwrap();
        evaluate(&ast, &tag_set(tags.iter().copied()), &MatchOptions::default())
    }

    fn eval_with(expr: &str, tags: &[&str], options: MatchOptions) -> bool {
        let ast = parse_expression(expr).unwrap();
        evaluate(&ast, &tag_set(tags.iter().copied()), &options)
    }

    #[test]
    fn test_single_tag() {
        assert!(eval("user:john", &["user:john", "device:mobile"]));
        assert!(!eval("user:john", &["user:jane", "device:mobile"]));
    }

    #[test]
    fn test_and() {
        assert!(eval("user:john+device:mobile", &["user:john", "device:mobile", "area:home"]));
        assert!(!eval("user:john+device:mobile", &["user:john", "area:home"]));
        assert!(!eval("a+b", &["a"]));
    }

    #[test]
    fn test_or() {
        assert!(eval("device:speaker|device:display", &["device:display"]));
        assert!(!eval("device:speaker|device:display", &["device:mobile"]));
    }

    #[test]
    fn test_not_sugar() {
        assert!(!eval("area:home-area:bedroom", &["area:home", "area:bedroom"]));
        assert!(eval("area:home-area:bedroom", &["area:home"]));
        assert!(!eval("area:home-area:bedroom", &["area:bedroom"]));
    }

    #[test]
    fn test_double_negation() {
        assert!(eval("!!tag", &["tag"]));
        assert!(!eval("!!tag", &[]));
    }

    #[test]
    fn test_precedence() {
        assert!(eval("a|b+c", &["a"]));
        assert!(!eval("(a|b)+c", &["a"]));
        assert!(eval("(a|b)+c", &["a", "c"]));
    }

    #[test]
    fn test_empty_matches_everything() {
        assert!(eval("", &[]));
        assert!(eval("", &["anything"]));
    }

    #[test]
    fn test_case_insensitive() {
        let options = MatchOptions {
            case_sensitive: false,
            ..MatchOptions::default()
        };
        assert!(eval_with("User:John", &["user:john"], options));
        assert!(!eval("User:John", &["user:john"]));
        assert!(eval_with("user:john", &["USER:JOHN"], options));
    }

    #[test]
    fn test_category_mode() {
        let options = MatchOptions {
            category_mode: true,
            ..MatchOptions::default()
        };
        assert!(eval_with("user:", &["user:john"], options));
        assert!(!eval_with("user:", &["device:mobile"], options));
        // exact match when category mode is off
        assert!(!eval("user:", &["user:john"]));
        assert!(eval("user:", &["user:"]));
    }

    #[test]
    fn test_category_mode_case_insensitive() {
        let options = MatchOptions {
            case_sensitive: false,
            category_mode: true,
            wildcards: false,
        };
        assert!(eval_with("User:", &["user:john"], options));
    }

    #[test]
    fn test_wildcards() {
        let options = MatchOptions {
            wildcards: true,
            ..MatchOptions::default()
        };
        assert!(eval_with("user:john+device:*", &["user:john", "device:tablet"], options));
        assert!(!eval_with("user:john+device:*", &["user:john"], options));
        assert!(eval_with("*", &[], options));
        // literal star without the option
        assert!(!eval("device:*", &["device:tablet"]));
        assert!(eval("device:*", &["device:*"]));
    }

    #[test]
    fn test_long_chain() {
        let users: Vec<String> = (0..1000).map(|i| format!("user:u{i}")).collect();
        let expr = users.join("|");
        assert!(eval(&expr, &["user:u999"]));
        assert!(!eval(&expr, &["user:u1000"]));
    }

    #[test]
    fn test_matching_tags() {
        let tags = tag_set(["user:john", "user:jane", "device:mobile"]);
        let options = MatchOptions {
            category_mode: true,
            ..MatchOptions::default()
        };
        assert_eq!(matching_tags("user:", &tags, &options), vec!["user:jane", "user:john"]);
        assert_eq!(matching_tags("device:mobile", &tags, &options), vec!["device:mobile"]);
        assert!(matching_tags("area:home", &tags, &options).is_empty());
    }

    #[test]
    fn test_try_evaluate_rejects_deep_trees() {
        let mut node = ExpressionNode::tag("a");
        for _ in 0..MAX_DEPTH {
            node = ExpressionNode::not(node);
        }
        let err = try_evaluate(&node, &TagSet::new(), &MatchOptions::default()).unwrap_err();
        assert_eq!(
            err,
            EvaluationError::DepthExceeded {
                depth: MAX_DEPTH + 1,
                limit: MAX_DEPTH
            }
        );

        let ok = ExpressionNode::not(ExpressionNode::tag("a"));
        assert_eq!(try_evaluate(&ok, &TagSet::new(), &MatchOptions::default()), Ok(true));
    }
}
