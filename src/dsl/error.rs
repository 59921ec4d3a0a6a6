//! Error types for the tag expression DSL.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Maximum parenthesis/negation nesting and tree depth the parser accepts,
/// and the maximum depth [`try_evaluate`](super::try_evaluate) accepts.
///
/// A tree of this depth serializes to at most 127 nested JSON containers,
/// which `serde_json` reads back with its default recursion limit.
pub const MAX_DEPTH: usize = 64;

/// Category of a parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorKind {
    /// Missing `)` or a `)` with no matching `(`.
    UnbalancedParens,
    /// An operand is missing before, between or inside operators (`()`, `+a`).
    EmptyOperand,
    /// A character that cannot start any token.
    InvalidCharacter,
    /// Input ends right after an operator (`a+`, `!`).
    TrailingOperator,
    /// Two operands written next to each other without an operator.
    MissingOperator,
    /// Tree or parenthesis depth exceeds [`MAX_DEPTH`].
    NestingTooDeep,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ParseErrorKind::UnbalancedParens => "unbalanced parentheses",
            ParseErrorKind::EmptyOperand => "empty operand",
            ParseErrorKind::InvalidCharacter => "invalid character",
            ParseErrorKind::TrailingOperator => "trailing operator",
            ParseErrorKind::MissingOperator => "missing operator",
            ParseErrorKind::NestingTooDeep => "nesting too deep",
        };
        f.write_str(label)
    }
}

/// A failure to parse a tag expression.
///
/// `offset` counts characters (not bytes) from the start of `expression`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{kind} at offset {offset} in \"{expression}\": expected {expected}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub offset: usize,
    pub expected: String,
    pub expression: String,
}

impl ParseError {
    pub(crate) fn new(
        kind: ParseErrorKind,
        offset: usize,
        expected: impl Into<String>,
        expression: &str,
    ) -> Self {
        ParseError {
            kind,
            offset,
            expected: expected.into(),
            expression: expression.to_string(),
        }
    }

    /// Render the expression with a caret under the offending character.
    pub fn caret_display(&self) -> String {
        let pad: String = " ".repeat(self.offset);
        format!("{}\n{}^ {}", self.expression, pad, self)
    }
}

/// A failure while evaluating an externally constructed tree.
///
/// Trees produced by the parser always evaluate; this only fires for trees
/// built by hand or deserialized from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    #[error("expression tree depth {depth} exceeds limit of {limit}")]
    DepthExceeded { depth: usize, limit: usize },
}
