//! Tag-expression matching for notification routing.
//!
//! Audiences are described by boolean expressions over entity tags
//! (`user:john+device:mobile`, `area:home-area:bedroom`). This crate parses
//! those expressions, evaluates them against tag sets, explains the result,
//! and resolves audiences against entity registries.
//!
//! ```
//! use tagroute::dsl::{MatchOptions, evaluate, parse_expression};
//! use tagroute::utils::tag_set;
//!
//! let tree = parse_expression("area:home-area:bedroom").unwrap();
//! let kitchen = tag_set(["area:home", "area:kitchen"]);
//! assert!(evaluate(&tree, &kitchen, &MatchOptions::default()));
//! ```

pub mod cache;
pub mod config;
pub mod dsl;
pub mod engine;
pub mod routing;
pub mod utils;

pub use dsl::{ExpressionNode, MatchOptions, ParseError, TagSet, parse_expression};
pub use engine::Engine;
