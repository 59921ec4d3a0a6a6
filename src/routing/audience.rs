//! Audience definitions and routing.

use anyhow::{Result, bail};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use super::resolve::{EntityTags, resolve_entities};
use super::severity::SeverityLevels;
use crate::config::{AudienceConfig, AudiencesConfig};
use crate::dsl::{ExpressionNode, MatchOptions, TagSet, evaluate, parse_expression};

/// A compiled audience.
#[derive(Debug, Clone)]
pub struct Audience {
    pub name: String,
    pub expression: String,
    pub tree: Arc<ExpressionNode>,
    pub services: Vec<String>,
    pub min_severity: Option<String>,
}

impl Audience {
    pub fn compile(config: &AudienceConfig) -> Result<Self> {
        let tree = parse_expression(&config.expression).map_err(|e| {
            anyhow::anyhow!("Error parsing expression of audience '{}': {}", config.name, e)
        })?;

        Ok(Audience {
            name: config.name.clone(),
            expression: config.expression.clone(),
            tree: Arc::new(tree),
            services: config.services.clone(),
            min_severity: config.min_severity.clone(),
        })
    }

    pub fn matches(&self, tags: &TagSet, options: &MatchOptions) -> bool {
        evaluate(&self.tree, tags, options)
    }

    /// Whether a notification of `severity` reaches this audience.
    pub fn accepts(&self, severity: &str, levels: &SeverityLevels) -> bool {
        let minimum = self.min_severity.as_deref().unwrap_or(levels.lowest());
        levels.is_at_least(severity, minimum)
    }
}

/// Entities reached by one audience.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudienceRoute {
    pub audience: String,
    pub services: Vec<String>,
    pub entities: Vec<String>,
    /// Set when the notification severity is below the audience minimum;
    /// `services` and `entities` are then empty.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub below_min_severity: bool,
}

/// Audiences in definition order, with the severity ordering they share.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    audiences: Vec<Audience>,
    severity_levels: SeverityLevels,
}

impl RoutingTable {
    /// Compile every audience; fails on the first invalid expression, a
    /// duplicated name or an unknown `min_severity`.
    pub fn compile(config: &AudiencesConfig) -> Result<Self> {
        let severity_levels = SeverityLevels::new(config.severity_levels.clone())?;
        let mut seen = HashSet::new();
        let mut audiences = Vec::with_capacity(config.audiences.len());

        for audience in &config.audiences {
            if !seen.insert(audience.name.as_str()) {
                bail!("Duplicate audience name '{}'", audience.name);
            }
            let unknown = audience
                .min_severity
                .as_deref()
                .filter(|min| !severity_levels.contains(min));
            if let Some(min) = unknown {
                bail!("Audience '{}' has unknown min_severity '{}'", audience.name, min);
            }
            audiences.push(Audience::compile(audience)?);
        }

        tracing::info!("Compiled {} audiences", audiences.len());
        Ok(RoutingTable {
            audiences,
            severity_levels,
        })
    }

    pub fn get(&self, name: &str) -> Option<&Audience> {
        self.audiences.iter().find(|a| a.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Audience> {
        self.audiences.iter()
    }

    pub fn len(&self) -> usize {
        self.audiences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.audiences.is_empty()
    }

    pub fn severity_levels(&self) -> &SeverityLevels {
        &self.severity_levels
    }

    fn severity_gate(&self, audience: &Audience, severity: Option<&str>) -> bool {
        severity.is_none_or(|s| audience.accepts(s, &self.severity_levels))
    }

    fn warn_unknown_severity(&self, severity: Option<&str>) {
        if let Some(s) = severity.filter(|s| !self.severity_levels.contains(s)) {
            tracing::warn!("Unknown severity level '{}'; no audience will be reached", s);
        }
    }

    /// Audiences whose expression matches one entity's tags. With a
    /// `severity`, audiences whose minimum it does not reach are left out.
    pub fn audiences_for(
        &self,
        tags: &TagSet,
        severity: Option<&str>,
        options: &MatchOptions,
    ) -> Vec<&Audience> {
        self.warn_unknown_severity(severity);
        self.audiences
            .iter()
            .filter(|a| self.severity_gate(a, severity) && a.matches(tags, options))
            .collect()
    }

    /// Resolve every audience against the entity registry. With a
    /// `severity`, audiences whose minimum it does not reach get no services
    /// and no entities.
    pub fn route(
        &self,
        entities: &EntityTags,
        severity: Option<&str>,
        options: &MatchOptions,
    ) -> Vec<AudienceRoute> {
        self.warn_unknown_severity(severity);
        self.audiences
            .iter()
            .map(|audience| {
                if !self.severity_gate(audience, severity) {
                    tracing::info!(
                        "Severity '{}' below minimum for audience '{}'",
                        severity.unwrap_or_default(),
                        audience.name
                    );
                    return AudienceRoute {
                        audience: audience.name.clone(),
                        services: Vec::new(),
                        entities: Vec::new(),
                        below_min_severity: true,
                    };
                }

                let reached = resolve_entities(&audience.tree, entities, options);
                if reached.is_empty() {
                    tracing::warn!("Audience '{}' reaches no entities", audience.name);
                }
                AudienceRoute {
                    audience: audience.name.clone(),
                    services: audience.services.clone(),
                    entities: reached,
                    below_min_severity: false,
                }
            })
            .collect()
    }
}
