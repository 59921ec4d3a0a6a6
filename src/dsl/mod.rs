//! Tag expression DSL for audience matching.
//!
//! Syntax:
//!   user:john               - entity has the tag
//!   a+b                     - AND
//!   a|b                     - OR (lower precedence than +)
//!   !a, -a                  - NOT
//!   a-b                     - a AND NOT b
//!   (expr)                  - grouping
//!   (empty)                 - matches every entity
//!
//! Literals are any run of characters other than `+ | ! - ( )` and
//! whitespace. With [`MatchOptions`], `user:` can match a whole category
//! and `device:*` can act as a glob.

mod ast;
mod error;
mod eval;
mod explain;
mod lexer;
mod parser;

pub use ast::ExpressionNode;
pub use error::{EvaluationError, MAX_DEPTH, ParseError, ParseErrorKind};
pub use eval::{MatchOptions, TagSet, evaluate, matching_tags, try_evaluate};
pub use explain::{AnnotatedNode, NodeKind, deserialize_tree, explain, serialize_tree};
pub use parser::parse_expression;
