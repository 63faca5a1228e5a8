//! Configuration for search runs, the execution registry and the provider

use std::time::Duration;

use shared::DateRange;

use crate::error::{OrchestratorError, OrchestratorResult};

/// Per-run search configuration
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Informational; one task per credential is always started
    pub max_concurrent_credentials: usize,
    pub per_call_timeout: Duration,
    pub ceiling_timeout: Duration,
    pub max_retries: u32,
    pub date_range: Option<DateRange>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_credentials: 3,
            per_call_timeout: Duration::from_secs(60),
            ceiling_timeout: Duration::from_secs(25 * 60),
            max_retries: 3,
            date_range: None,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> OrchestratorResult<()> {
        if self.per_call_timeout.is_zero() {
            return Err(OrchestratorError::config("per_call_timeout must be positive"));
        }
        if self.ceiling_timeout < self.per_call_timeout {
            return Err(OrchestratorError::config(
                "ceiling_timeout must not be shorter than per_call_timeout",
            ));
        }
        if let Some(DateRange { from: Some(from), to: Some(to) }) = self.date_range {
            if from > to {
                return Err(OrchestratorError::config("date_range.from is after date_range.to"));
            }
        }
        Ok(())
    }

    pub fn with_date_range(mut self, date_range: Option<DateRange>) -> Self {
        self.date_range = date_range;
        self
    }
}

/// Retention and sweep settings for the execution registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub max_history_size: usize,
    pub history_retention: Duration,
    pub staleness_threshold: Duration,
    pub sweep_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_history_size: 100,
            history_retention: Duration::from_secs(24 * 60 * 60),
            staleness_threshold: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
        }
    }
}

/// Relationship-discovery provider endpoint settings
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub endpoint: String,
    pub depth: String,
    pub output_type: String,
    pub exclude_domains: Vec<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.linkup.so/v1/search".to_string(),
            depth: "standard".to_string(),
            output_type: "sourcedAnswer".to_string(),
            exclude_domains: vec!["wikipedia.org".to_string()],
        }
    }
}
