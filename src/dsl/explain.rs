//! Explain mode and JSON export of expression trees.
//!
//! [`explain`] walks a tree once against a tag set and records, for every
//! node, its own result and whether it decided its parent's result. UIs use
//! the `decisive` flags to highlight why an entity did or did not match.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use serde_json::Value;

use super::ast::ExpressionNode;
use super::eval::{MatchOptions, TagSet, check_depth, evaluate, matching_tags};
use super::lexer::is_reserved;

/// Node type in an annotated tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    AlwaysMatch,
    Tag,
    Not,
    And,
    Or,
}

/// One node of an explained expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotatedNode {
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Canonical text of the whole expression; set on the root only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub matched: bool,
    /// True when this node's result determined the overall result.
    pub decisive: bool,
    /// For literals: the entity tags that satisfied it.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub matched_tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<AnnotatedNode>,
}

impl AnnotatedNode {
    /// Literals flagged as decisive, in left-to-right order.
    pub fn decisive_literals(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_decisive(&mut out);
        out
    }

    fn collect_decisive<'a>(&'a self, out: &mut Vec<&'a str>) {
        if !self.decisive {
            return;
        }
        if let Some(value) = &self.value {
            out.push(value);
        }
        for child in &self.children {
            child.collect_decisive(out);
        }
    }
}

/// Annotate every node of `node` with its result against `tags`.
///
/// Unlike [`evaluate`], every node is evaluated so the whole tree carries a
/// result. The root's `matched` always equals `evaluate(node, tags, options)`.
pub fn explain(node: &ExpressionNode, tags: &TagSet, options: &MatchOptions) -> AnnotatedNode {
    let mut root = annotate(node, tags, options);
    root.expression = Some(node.to_string());
    mark_decisive(&mut root, true);
    root
}

fn annotate(node: &ExpressionNode, tags: &TagSet, options: &MatchOptions) -> AnnotatedNode {
    let children: Vec<AnnotatedNode> = node
        .children()
        .into_iter()
        .map(|child| annotate(child, tags, options))
        .collect();

    let (kind, value, matched, matched_tags) = match node {
        ExpressionNode::AlwaysMatch => (NodeKind::AlwaysMatch, None, true, Vec::new()),
        ExpressionNode::Tag { value } => {
            let hits: Vec<String> = matching_tags(value, tags, options)
                .into_iter()
                .map(str::to_string)
                .collect();
            let matched = evaluate(node, tags, options);
            (NodeKind::Tag, Some(value.clone()), matched, hits)
        }
        ExpressionNode::Not { .. } => (NodeKind::Not, None, !children[0].matched, Vec::new()),
        ExpressionNode::And { .. } => (
            NodeKind::And,
            None,
            children.iter().all(|c| c.matched),
            Vec::new(),
        ),
        ExpressionNode::Or { .. } => (
            NodeKind::Or,
            None,
            children.iter().any(|c| c.matched),
            Vec::new(),
        ),
    };

    AnnotatedNode {
        kind,
        expression: None,
        value,
        matched,
        decisive: false,
        matched_tags,
        children,
    }
}

fn mark_decisive(node: &mut AnnotatedNode, decisive: bool) {
    node.decisive = decisive;
    let matched = node.matched;
    let kind = node.kind;

    for child in &mut node.children {
        let child_decides = decisive
            && match kind {
                // a false AND is decided by its false operands
                NodeKind::And if !matched => !child.matched,
                // a true OR is decided by its true operands
                NodeKind::Or if matched => child.matched,
                _ => true,
            };
        mark_decisive(child, child_decides);
    }
}

/// Convert a tree to its canonical JSON form.
pub fn serialize_tree(node: &ExpressionNode) -> serde_json::Result<Value> {
    serde_json::to_value(node)
}

/// Rebuild a tree from its canonical JSON form.
///
/// Rejects trees the parser could never have produced: too deep, an
/// `always_match` below the root, an `and`/`or` with fewer than two
/// operands, or a tag value that is empty or contains reserved characters.
pub fn deserialize_tree(value: Value) -> Result<ExpressionNode> {
    let node: ExpressionNode =
        serde_json::from_value(value).context("Tree: invalid expression tree JSON")?;
    check_depth(&node)?;
    validate_node(&node)?;

    let mut stack: Vec<&ExpressionNode> = node.children();
    while let Some(current) = stack.pop() {
        match current {
            ExpressionNode::AlwaysMatch => bail!("Tree: always_match is only valid at the root"),
            other => {
                validate_node(other)?;
                stack.extend(other.children());
            }
        }
    }

    Ok(node)
}

fn validate_node(node: &ExpressionNode) -> Result<()> {
    match node {
        ExpressionNode::Tag { value } => validate_literal(value),
        ExpressionNode::And { operands } | ExpressionNode::Or { operands }
            if operands.len() < 2 =>
        {
            bail!("Tree: and/or needs at least two operands, got {}", operands.len())
        }
        _ => Ok(()),
    }
}

fn validate_literal(value: &str) -> Result<()> {
    if value.is_empty() {
        bail!("Tree: empty tag literal");
    }
    if let Some(c) = value
        .chars()
        .find(|c| is_reserved(*c) || c.is_whitespace() || c.is_control())
    {
        bail!("Tree: tag literal '{}' contains reserved character {:?}", value, c);
    }
    Ok(())
}
