use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

pub use crate::dsl::MatchOptions;
use crate::cache::DEFAULT_CAPACITY;
use crate::routing::{DEFAULT_SEVERITY_LEVELS, EntityTags};

/// Prefix for environment overrides, e.g. `TAGROUTE_MATCHING__CASE_SENSITIVE=false`.
pub const ENV_PREFIX: &str = "TAGROUTE";

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub matching: MatchOptions,
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of parsed expressions kept; 0 disables the cache.
    pub capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Load from an optional file (YAML, TOML or JSON by extension) with
    /// `TAGROUTE_*` environment variables layered on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path));
        }
        let settings = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Config: Failed to read engine configuration")?;
        let config: EngineConfig = settings
            .try_deserialize()
            .context("Config: Invalid engine configuration")?;
        tracing::debug!(?config, "engine configuration loaded");
        Ok(config)
    }
}

/// A named routing target defined by a tag expression.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct AudienceConfig {
    pub name: String,
    /// Tag expression; empty reaches every entity.
    #[serde(default)]
    pub expression: String,
    /// Delivery services attached to the audience (opaque to the engine).
    #[serde(default)]
    pub services: Vec<String>,
    /// Notifications below this severity are not delivered to the audience;
    /// unset means the lowest configured level.
    #[serde(default)]
    pub min_severity: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct AudiencesConfig {
    #[serde(default)]
    pub audiences: Vec<AudienceConfig>,
    /// Severity names from least to most severe.
    #[serde(default = "default_severity_levels")]
    pub severity_levels: Vec<String>,
}

fn default_severity_levels() -> Vec<String> {
    DEFAULT_SEVERITY_LEVELS.iter().map(|s| s.to_string()).collect()
}

impl Default for AudiencesConfig {
    fn default() -> Self {
        Self {
            audiences: Vec::new(),
            severity_levels: default_severity_levels(),
        }
    }
}

impl AudiencesConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .build()
            .with_context(|| format!("Config: Failed to read audiences from {:?}", path))?;
        settings
            .try_deserialize()
            .with_context(|| format!("Config: Invalid audiences file {:?}", path))
    }
}

/// Load an entity registry (`entity_id: [tags...]`) from JSON or YAML.
///
/// Entity ids commonly contain dots (`light.kitchen`), which the layered
/// `config` sources treat as key paths, so this reads the file directly.
pub fn load_entities(path: &Path) -> Result<EntityTags> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Config: Failed to read entities file {:?}", path))?;

    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext.to_lowercase().as_str(), "yaml" | "yml"));

    let raw: BTreeMap<String, Vec<String>> = if is_yaml {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Config: Invalid YAML entities file {:?}", path))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Config: Invalid JSON entities file {:?}", path))?
    };

    let entities: EntityTags = raw
        .into_iter()
        .map(|(id, tags)| (id, tags.into_iter().collect::<HashSet<_>>()))
        .collect();
    tracing::info!("Loaded {} entities from {:?}", entities.len(), path);
    Ok(entities)
}
