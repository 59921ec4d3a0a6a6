//! Bounded cache of parsed expressions keyed by expression text.

use moka::sync::Cache;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::dsl::{ExpressionNode, ParseError, parse_expression};

pub const DEFAULT_CAPACITY: u64 = 256;

/// Hit/miss counters. Approximate under concurrency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// A bounded, thread-safe map from expression string to parsed tree,
/// backed by [`moka`].
///
/// Concurrent misses for the same expression coalesce into a single parse.
/// Parse failures are returned to every waiting caller and never cached.
/// A capacity of zero disables caching.
pub struct ExpressionCache {
    cache: Option<Cache<String, Arc<ExpressionNode>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ExpressionCache {
    pub fn new(capacity: u64) -> Self {
        let cache = (capacity > 0).then(|| Cache::builder().max_capacity(capacity).build());
        Self {
            cache,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached tree for `expression`, parsing it on a miss.
    pub fn get_or_parse(&self, expression: &str) -> Result<Arc<ExpressionNode>, ParseError> {
        let Some(cache) = &self.cache else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return parse_expression(expression).map(Arc::new);
        };

        if let Some(tree) = cache.get(expression) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(tree);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(expression, "expression cache miss");
        cache
            .try_get_with(expression.to_string(), || {
                parse_expression(expression).map(Arc::new)
            })
            .map_err(Arc::unwrap_or_clone)
    }

    /// Number of cached trees, after applying pending evictions.
    pub fn len(&self) -> u64 {
        match &self.cache {
            Some(cache) => {
                cache.run_pending_tasks();
                cache.entry_count()
            }
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, expression: &str) -> bool {
        self.cache
            .as_ref()
            .is_some_and(|cache| cache.contains_key(expression))
    }

    pub fn clear(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
            tracing::debug!("expression cache cleared");
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for ExpressionCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for ExpressionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpressionCache")
            .field("enabled", &self.cache.is_some())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
