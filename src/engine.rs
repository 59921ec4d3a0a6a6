//! Engine facade: matching options plus an owned expression cache.

use std::sync::Arc;

use crate::cache::ExpressionCache;
use crate::config::EngineConfig;
use crate::dsl::{
    AnnotatedNode, ExpressionNode, MatchOptions, ParseError, TagSet, evaluate, explain,
};
use crate::routing::{EntityTags, resolve_entities};

/// Parses, caches and evaluates tag expressions.
///
/// Each engine owns its cache, so independent engines (and tests) never
/// share state. `Engine` is `Send + Sync`; wrap it in an `Arc` to share it.
#[derive(Debug)]
pub struct Engine {
    options: MatchOptions,
    cache: ExpressionCache,
}

impl Engine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            options: config.matching,
            cache: ExpressionCache::new(config.cache.capacity),
        }
    }

    pub fn with_options(options: MatchOptions) -> Self {
        Self {
            options,
            cache: ExpressionCache::default(),
        }
    }

    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    pub fn cache(&self) -> &ExpressionCache {
        &self.cache
    }

    /// Parse `expression`, reusing a cached tree when available.
    pub fn compile(&self, expression: &str) -> Result<Arc<ExpressionNode>, ParseError> {
        self.cache.get_or_parse(expression)
    }

    pub fn matches(&self, expression: &str, tags: &TagSet) -> Result<bool, ParseError> {
        let tree = self.compile(expression)?;
        Ok(evaluate(&tree, tags, &self.options))
    }

    pub fn explain(&self, expression: &str, tags: &TagSet) -> Result<AnnotatedNode, ParseError> {
        let tree = self.compile(expression)?;
        Ok(explain(&tree, tags, &self.options))
    }

    /// Sorted ids of the entities matching `expression`.
    pub fn resolve(
        &self,
        expression: &str,
        entities: &EntityTags,
    ) -> Result<Vec<String>, ParseError> {
        let tree = self.compile(expression)?;
        let matched = resolve_entities(&tree, entities, &self.options);
        tracing::info!(
            "Resolved '{}' to {} of {} entities",
            expression,
            matched.len(),
            entities.len()
        );
        Ok(matched)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}
