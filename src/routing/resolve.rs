//! Resolve one expression against many entities.

use rayon::prelude::*;
use std::collections::BTreeMap;

use crate::dsl::{ExpressionNode, MatchOptions, TagSet, evaluate};

/// Entity id -> tags currently attached to it.
pub type EntityTags = BTreeMap<String, TagSet>;

/// Below this many entities a sequential scan beats rayon's fan-out.
const PARALLEL_THRESHOLD: usize = 1024;

/// Ids of the entities whose tags satisfy `node`, sorted.
pub fn resolve_entities(
    node: &ExpressionNode,
    entities: &EntityTags,
    options: &MatchOptions,
) -> Vec<String> {
    let mut matched: Vec<String> = if entities.len() >= PARALLEL_THRESHOLD {
        entities
            .par_iter()
            .filter(|(_, tags)| evaluate(node, tags, options))
            .map(|(id, _)| id.clone())
            .collect()
    } else {
        entities
            .iter()
            .filter(|(_, tags)| evaluate(node, tags, options))
            .map(|(id, _)| id.clone())
            .collect()
    };
    matched.sort_unstable();

    tracing::debug!(
        expression = %node,
        matched = matched.len(),
        total = entities.len(),
        "resolved expression"
    );
    matched
}
