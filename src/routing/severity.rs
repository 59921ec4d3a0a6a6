//! Notification severity ordering.

use anyhow::{Result, bail};
use std::collections::HashSet;

pub const DEFAULT_SEVERITY_LEVELS: [&str; 4] = ["low", "medium", "high", "emergency"];

/// Severity names ordered from least to most severe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeverityLevels {
    levels: Vec<String>,
}

impl SeverityLevels {
    pub fn new(levels: Vec<String>) -> Result<Self> {
        if levels.is_empty() {
            bail!("Config: severity_levels must not be empty");
        }
        let mut seen = HashSet::new();
        for level in &levels {
            if !seen.insert(level.as_str()) {
                bail!("Config: duplicate severity level '{}'", level);
            }
        }
        Ok(SeverityLevels { levels })
    }

    /// Position of `severity` in the ordering; higher is more severe.
    pub fn rank(&self, severity: &str) -> Option<usize> {
        self.levels.iter().position(|level| level == severity)
    }

    pub fn contains(&self, severity: &str) -> bool {
        self.rank(severity).is_some()
    }

    pub fn lowest(&self) -> &str {
        self.levels.first().map(String::as_str).unwrap_or_default()
    }

    /// True when both names are known and `severity` ranks at or above
    /// `minimum`. Unknown names never pass.
    pub fn is_at_least(&self, severity: &str, minimum: &str) -> bool {
        match (self.rank(severity), self.rank(minimum)) {
            (Some(severity), Some(minimum)) => severity >= minimum,
            _ => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.levels.iter().map(String::as_str)
    }
}

impl Default for SeverityLevels {
    fn default() -> Self {
        SeverityLevels {
            levels: DEFAULT_SEVERITY_LEVELS.iter().map(|s| s.to_string()).collect(),
        }
    }
}
