//! Configuration types for the dependency engine.
//!
//! Every field has a default, so a TOML file only needs the values it
//! overrides:
//!
//! ```toml
//! verbosity = 1
//!
//! [scheduling]
//! critical_path_weight = 0.5
//! slack_ceiling_hours = 40.0
//!
//! [scheduling.affinities]
//! docs = ["writer"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::blocking::{default_rules, RecommendationRule};

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Weights and normalization ceilings for ranking ready tasks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    /// Weight for normalized priority.
    pub priority_weight: f64,
    /// Weight for being on the critical path.
    pub critical_path_weight: f64,
    /// Weight for (1 - normalized slack).
    pub slack_weight: f64,
    /// Weight for (1 - normalized effort).
    pub effort_weight: f64,
    /// Priority value that normalizes to 1.0.
    pub priority_ceiling: f64,
    /// Slack (hours) that normalizes to 1.0.
    pub slack_ceiling_hours: f64,
    /// Effort (hours) that normalizes to 1.0.
    pub effort_ceiling_hours: f64,
    /// Flat bonus when the requesting agent type has affinity for the task type.
    pub affinity_bonus: f64,
    /// Task type -> agent types with affinity for it.
    pub affinities: BTreeMap<String, Vec<String>>,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            priority_weight: 0.4,
            critical_path_weight: 0.3,
            slack_weight: 0.2,
            effort_weight: 0.1,
            priority_ceiling: 5.0,
            slack_ceiling_hours: 24.0,
            effort_ceiling_hours: 8.0,
            affinity_bonus: 0.2,
            affinities: BTreeMap::new(),
        }
    }
}

impl SchedulingConfig {
    /// Whether `agent_type` declared affinity for tasks of `task_type`.
    pub fn has_affinity(&self, task_type: &str, agent_type: &str) -> bool {
        self.affinities
            .get(task_type)
            .map(|agents| agents.iter().any(|a| a == agent_type))
            .unwrap_or(false)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let weights = [
            ("priority_weight", self.priority_weight),
            ("critical_path_weight", self.critical_path_weight),
            ("slack_weight", self.slack_weight),
            ("effort_weight", self.effort_weight),
            ("affinity_bonus", self.affinity_bonus),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        let ceilings = [
            ("priority_ceiling", self.priority_ceiling),
            ("slack_ceiling_hours", self.slack_ceiling_hours),
            ("effort_ceiling_hours", self.effort_ceiling_hours),
        ];
        for (name, value) in ceilings {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Recommendation rules applied to blocking impact reports.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockingConfig {
    pub rules: Vec<RecommendationRule>,
}

impl Default for BlockingConfig {
    fn default() -> Self {
        Self {
            rules: default_rules(),
        }
    }
}

/// Top-level engine configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Verbosity level: 0=silent, 1=changes, 2=checks, 3=debug.
    pub verbosity: u8,
    pub scheduling: SchedulingConfig,
    pub blocking: BlockingConfig,
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scheduling.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduling_defaults() {
        let config = SchedulingConfig::default();
        assert!((config.priority_weight - 0.4).abs() < 1e-9);
        assert!((config.critical_path_weight - 0.3).abs() < 1e-9);
        assert!((config.slack_weight - 0.2).abs() < 1e-9);
        assert!((config.effort_weight - 0.1).abs() < 1e-9);
        assert!((config.slack_ceiling_hours - 24.0).abs() < 1e-9);
        assert!((config.effort_ceiling_hours - 8.0).abs() < 1e-9);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            verbosity = 2

            [scheduling]
            critical_path_weight = 0.5

            [scheduling.affinities]
            docs = ["writer", "reviewer"]
            "#,
        )
        .unwrap();

        assert_eq!(config.verbosity, 2);
        assert!((config.scheduling.critical_path_weight - 0.5).abs() < 1e-9);
        assert!((config.scheduling.priority_weight - 0.4).abs() < 1e-9);
        assert!(config.scheduling.has_affinity("docs", "writer"));
        assert!(!config.scheduling.has_affinity("docs", "coder"));
        assert!(!config.scheduling.has_affinity("tests", "writer"));
        assert_eq!(config.blocking.rules, default_rules());
    }

    #[test]
    fn test_invalid_ceiling_rejected() {
        let err = EngineConfig::from_toml_str(
            r#"
            [scheduling]
            effort_ceiling_hours = 0.0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_negative_weight_rejected() {
        let config = SchedulingConfig {
            slack_weight: -0.1,
            ..SchedulingConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml() {
        let err = EngineConfig::from_toml_str("verbosity = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
