//! AST types for the tag expression DSL.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A parsed tag expression.
///
/// Trees are immutable once built; share them across threads behind an
/// `Arc` and evaluate against as many tag sets as needed. `And` and `Or`
/// hold all operands of a chain, so `a|b|c` is one node with three operands
/// and tree depth follows parenthesis and negation nesting only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExpressionNode {
    /// Empty expression; matches every tag set. Only valid at the root.
    AlwaysMatch,

    /// Tag literal: `user:john`
    Tag { value: String },

    /// Negation: `!expr` or `-expr`
    Not { child: Box<ExpressionNode> },

    /// Conjunction: `a + b + ...`
    And { operands: Vec<ExpressionNode> },

    /// Disjunction: `a | b | ...`
    Or { operands: Vec<ExpressionNode> },
}

impl ExpressionNode {
    pub fn tag(value: impl Into<String>) -> Self {
        ExpressionNode::Tag {
            value: value.into(),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(child: ExpressionNode) -> Self {
        ExpressionNode::Not {
            child: Box::new(child),
        }
    }

    /// Two-operand conjunction, kept as written (no flattening).
    pub fn and(left: ExpressionNode, right: ExpressionNode) -> Self {
        ExpressionNode::And {
            operands: vec![left, right],
        }
    }

    /// Two-operand disjunction, kept as written (no flattening).
    pub fn or(left: ExpressionNode, right: ExpressionNode) -> Self {
        ExpressionNode::Or {
            operands: vec![left, right],
        }
    }

    /// Conjunction of `operands`, merging operands that are themselves
    /// conjunctions. A single operand is returned unchanged.
    pub fn all(operands: Vec<ExpressionNode>) -> Self {
        let mut flat = Vec::with_capacity(operands.len());
        for operand in operands {
            match operand {
                ExpressionNode::And { operands: inner } => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            1 => flat.swap_remove(0),
            _ => ExpressionNode::And { operands: flat },
        }
    }

    /// Disjunction of `operands`, merging operands that are themselves
    /// disjunctions. A single operand is returned unchanged.
    pub fn any(operands: Vec<ExpressionNode>) -> Self {
        let mut flat = Vec::with_capacity(operands.len());
        for operand in operands {
            match operand {
                ExpressionNode::Or { operands: inner } => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            1 => flat.swap_remove(0),
            _ => ExpressionNode::Or { operands: flat },
        }
    }

    /// Child nodes in left-to-right order.
    pub fn children(&self) -> Vec<&ExpressionNode> {
        match self {
            ExpressionNode::AlwaysMatch | ExpressionNode::Tag { .. } => Vec::new(),
            ExpressionNode::Not { child } => vec![child.as_ref()],
            ExpressionNode::And { operands } | ExpressionNode::Or { operands } => {
                operands.iter().collect()
            }
        }
    }

    /// Distinct tag literals in first-appearance order.
    pub fn literals(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if let ExpressionNode::Tag { value } = node {
                if !out.contains(&value.as_str()) {
                    out.push(value);
                }
            }
            // reversed so the left child is visited first
            stack.extend(node.children().into_iter().rev());
        }
        out
    }

    /// Total number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children());
        }
        count
    }

    /// Longest root-to-leaf path, counting nodes. Iterative so it is safe on
    /// trees that did not come from the parser.
    pub fn depth(&self) -> usize {
        let mut max = 0;
        let mut stack = vec![(self, 1usize)];
        while let Some((node, level)) = stack.pop() {
            max = max.max(level);
            for child in node.children() {
                stack.push((child, level + 1));
            }
        }
        max
    }

    fn precedence(&self) -> u8 {
        match self {
            ExpressionNode::Or { .. } => 1,
            ExpressionNode::And { .. } => 2,
            _ => 3,
        }
    }

    /// Write `self` as an operand, parenthesized unless it binds tighter
    /// than `precedence`.
    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, precedence: u8) -> fmt::Result {
        match self {
            ExpressionNode::AlwaysMatch => write!(f, "()"),
            node if node.precedence() <= precedence => write!(f, "({})", node),
            node => write!(f, "{}", node),
        }
    }

    fn fmt_chain(
        f: &mut fmt::Formatter<'_>,
        operands: &[ExpressionNode],
        separator: &str,
        precedence: u8,
    ) -> fmt::Result {
        for (i, operand) in operands.iter().enumerate() {
            if i > 0 {
                f.write_str(separator)?;
            }
            operand.fmt_operand(f, precedence)?;
        }
        Ok(())
    }
}

/// Canonical expression text. Re-parsing the output of a parser-produced
/// tree yields the same tree.
impl fmt::Display for ExpressionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpressionNode::AlwaysMatch => Ok(()),
            ExpressionNode::Tag { value } => write!(f, "{}", value),
            ExpressionNode::Not { child } => {
                write!(f, "!")?;
                child.fmt_operand(f, 2)
            }
            ExpressionNode::And { operands } => Self::fmt_chain(f, operands, "+", 2),
            ExpressionNode::Or { operands } => Self::fmt_chain(f, operands, "|", 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(v: &str) -> ExpressionNode {
        ExpressionNode::tag(v)
    }

    #[test]
    fn test_display_respects_precedence() {
        let node = ExpressionNode::and(
            ExpressionNode::or(tag("a"), tag("b")),
            ExpressionNode::not(tag("c")),
        );
        assert_eq!(node.to_string(), "(a|b)+!c");
    }

    #[test]
    fn test_display_keeps_explicit_nesting() {
        let node = ExpressionNode::or(tag("a"), ExpressionNode::or(tag("b"), tag("c")));
        assert_eq!(node.to_string(), "a|(b|c)");
    }

    #[test]
    fn test_display_chain() {
        let node = ExpressionNode::any(vec![tag("a"), tag("b"), tag("c")]);
        assert_eq!(node.to_string(), "a|b|c");
    }

    #[test]
    fn test_all_and_any_flatten_one_level() {
        let node = ExpressionNode::all(vec![
            ExpressionNode::and(tag("a"), tag("b")),
            ExpressionNode::or(tag("c"), tag("d")),
            tag("e"),
        ]);
        assert_eq!(
            node,
            ExpressionNode::And {
                operands: vec![
                    tag("a"),
                    tag("b"),
                    ExpressionNode::or(tag("c"), tag("d")),
                    tag("e"),
                ]
            }
        );
        assert_eq!(ExpressionNode::any(vec![tag("a")]), tag("a"));
    }

    #[test]
    fn test_literals_dedup_in_order() {
        let node = ExpressionNode::or(
            ExpressionNode::and(tag("user:john"), tag("x")),
            ExpressionNode::not(tag("user:john")),
        );
        assert_eq!(node.literals(), vec!["user:john", "x"]);
    }

    #[test]
    fn test_counts() {
        let node = ExpressionNode::not(ExpressionNode::and(tag("a"), tag("b")));
        assert_eq!(node.node_count(), 4);
        assert_eq!(node.depth(), 3);
        assert_eq!(ExpressionNode::AlwaysMatch.depth(), 1);

        let chain = ExpressionNode::any((0..1000).map(|i| tag(&format!("u{i}"))).collect());
        assert_eq!(chain.depth(), 2);
        assert_eq!(chain.node_count(), 1001);
    }

    #[test]
    fn test_json_shape() {
        let node = ExpressionNode::not(ExpressionNode::and(tag("a"), tag("b")));
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "not",
                "child": {
                    "type": "and",
                    "operands": [
                        {"type": "tag", "value": "a"},
                        {"type": "tag", "value": "b"},
                    ]
                }
            })
        );
    }
}
