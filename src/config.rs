use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable holding a JSON `FlowTraceConfig`.
pub const CONFIG_ENV: &str = "FLOWTRACE_CONFIG";

/// Prefetch per derived stream in `flat_map`.
pub const DEFAULT_MERGE_PREFETCH: u64 = 128;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("pipeline.merge_prefetch must be at least 1")]
    ZeroPrefetch,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowTraceConfig {
    pub tracer: TracerConfig,
    pub pipeline: PipelineConfig,
    pub validator: ValidatorConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracerConfig {
    /// Log every emitted notification at DEBUG level.
    pub log_notifications: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub merge_prefetch: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            merge_prefetch: DEFAULT_MERGE_PREFETCH,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Fail when no stream was attached at all.
    pub require_activity: bool,
    /// Reject a repeated Subscribe/OnStart and demand or delivery before OnStart.
    pub strict_start: bool,
}

impl FlowTraceConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.check()?;
        Ok(config)
    }

    /// Reads `FLOWTRACE_CONFIG`; defaults when unset or blank.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_ENV) {
            Ok(json) if !json.trim().is_empty() => Self::from_json(&json),
            _ => Ok(Self::default()),
        }
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.pipeline.merge_prefetch == 0 {
            return Err(ConfigError::ZeroPrefetch);
        }
        Ok(())
    }
}
