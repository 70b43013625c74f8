use serde::Deserialize;
use std::{collections::BTreeMap, path::Path, path::PathBuf};
use thiserror::Error;

use crate::yaml_include::render_yaml_with_includes;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse yaml in {path:?}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("include cycle detected at {0:?}")]
    IncludeCycle(PathBuf),

    #[error("failed to emit merged yaml: {0}")]
    Emit(String),

    #[error("failed to deserialize config: {0}")]
    Deserialize(#[from] serde_yml::Error),

    #[error("invalid config value for {field}: {message}")]
    Invalid { field: String, message: String },
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CommonConfig {
    pub project_name: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdsConfig {
    pub high: i32,
    pub medium: i32,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            high: 60,
            medium: 30,
        }
    }
}

/// Engine tuning. Flag, type and scope names are kept as strings here and
/// resolved by the engine, which owns those vocabularies.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
    #[serde(default)]
    pub expectation_scope: Option<String>,
    /// CNAE prefix -> expected location type, layered over the built-in table.
    #[serde(default)]
    pub cnae_overrides: BTreeMap<String, String>,
    /// Flag token -> weight, layered over the built-in weights.
    #[serde(default)]
    pub weight_overrides: BTreeMap<String, i32>,
    #[serde(default)]
    pub min_domain_age_days: Option<i64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ProcessorConfig {
    pub threads: u32,
    pub sleep_ms: u64,
    pub log_level: String,
    #[serde(default)]
    pub metrics_address: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    pub common: CommonConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    pub processor: ProcessorConfig,
}

impl Config {
    pub fn load(config_path: &str) -> Result<Self, ConfigError> {
        let contents = render_yaml_with_includes(Path::new(config_path))?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let t = self.engine.thresholds;
        if !(0 < t.medium && t.medium < t.high && t.high <= 100) {
            return Err(ConfigError::Invalid {
                field: "engine.thresholds".to_string(),
                message: format!(
                    "expected 0 < medium < high <= 100, got medium={} high={}",
                    t.medium, t.high
                ),
            });
        }
        if self.processor.threads == 0 {
            return Err(ConfigError::Invalid {
                field: "processor.threads".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
