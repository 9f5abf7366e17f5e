// ABOUTME: OrchestratorConfig - fan-out, event queue, and retention settings.
// ABOUTME: Deserializable with defaults so it can live next to agent definitions.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Settings for the subagent orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrchestratorConfig {
    /// Maximum concurrently running children.
    pub max_concurrent: usize,

    /// Capacity of each event subscriber's queue.
    pub event_queue_capacity: usize,

    /// How long a terminal run stays queryable, in milliseconds.
    pub retention_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            event_queue_capacity: 256,
            retention_ms: 300_000,
        }
    }
}

impl OrchestratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse settings from JSON; absent fields keep their defaults.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: OrchestratorConfig = serde_json::from_str(content)
            .map_err(|e| ConfigError::parse("orchestrator settings", None, e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent == 0 {
            return Err(ConfigError::parse(
                "orchestrator settings",
                None,
                "`max_concurrent` must be at least 1",
            ));
        }
        if self.event_queue_capacity == 0 {
            return Err(ConfigError::parse(
                "orchestrator settings",
                None,
                "`event_queue_capacity` must be at least 1",
            ));
        }
        Ok(())
    }

    /// Set the fan-out limit (clamped to at least 1).
    pub fn max_concurrent(mut self, limit: usize) -> Self {
        self.max_concurrent = limit.max(1);
        self
    }

    /// Set each subscriber's queue capacity (clamped to at least 1).
    pub fn event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = capacity.max(1);
        self
    }

    pub fn retention(mut self, retention: Duration) -> Self {
        self.retention_ms = u64::try_from(retention.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn retention_duration(&self) -> Duration {
        Duration::from_millis(self.retention_ms)
    }
}
