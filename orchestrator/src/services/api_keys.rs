//! Environment-based provider credential loading
//!
//! Credentials are loaded from:
//! 1. `.env` file in the current directory or parent directories (if present)
//! 2. System environment variables
//!
//! Environment variables take precedence over .env file values.
//!
//! ## Recognised keys
//! - `DISCOVERY_API_KEYS`: comma-separated list of keys
//! - `DISCOVERY_API_KEY_1` .. `DISCOVERY_API_KEY_N`: one key each, read until
//!   the first gap
//!
//! Duplicate keys are dropped so two pools never share a credential.

use async_trait::async_trait;
use tracing::info;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::CredentialSource;
use crate::types::Credential;

/// Default environment variable prefix
pub const DEFAULT_KEY_PREFIX: &str = "DISCOVERY";

/// Upper bound on numbered keys scanned
const MAX_NUMBERED_KEYS: usize = 64;

/// Real credential source using environment variables
#[derive(Debug, Clone)]
pub struct RealCredentialSource {
    prefix: String,
}

impl RealCredentialSource {
    pub fn new() -> Self {
        Self::with_prefix(DEFAULT_KEY_PREFIX)
    }

    /// Read `{prefix}_API_KEYS` and `{prefix}_API_KEY_N` instead of the defaults
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    fn list_var(&self) -> String {
        format!("{}_API_KEYS", self.prefix)
    }

    fn numbered_var(&self, n: usize) -> String {
        format!("{}_API_KEY_{n}", self.prefix)
    }

    /// Initialize environment by loading .env file if present
    fn init_env() {
        // Missing .env is fine
        let _ = dotenv::dotenv();
    }

    /// Collect credentials through `lookup`, in list-then-numbered order
    pub fn collect<F>(&self, lookup: F) -> OrchestratorResult<Vec<Credential>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut keys: Vec<(String, String)> = Vec::new();
        let mut push = |label: String, value: &str| {
            let value = value.trim();
            if !value.is_empty() && !keys.iter().any(|(_, existing)| existing == value) {
                keys.push((label, value.to_string()));
            }
        };

        let list_var = self.list_var();
        if let Some(list) = lookup(&list_var) {
            for (position, value) in list.split(',').enumerate() {
                push(format!("{list_var}[{position}]"), value);
            }
        }

        for n in 1..=MAX_NUMBERED_KEYS {
            let name = self.numbered_var(n);
            match lookup(&name) {
                Some(value) => push(name, &value),
                None => break,
            }
        }

        if keys.is_empty() {
            return Err(OrchestratorError::MissingCredential {
                key_name: format!("{} or {}", list_var, self.numbered_var(1)),
            });
        }

        Ok(keys
            .into_iter()
            .enumerate()
            .map(|(index, (label, api_key))| Credential::new(index, label, api_key))
            .collect())
    }
}

impl Default for RealCredentialSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialSource for RealCredentialSource {
    async fn load_credentials(&self) -> OrchestratorResult<Vec<Credential>> {
        Self::init_env();

        let credentials = self.collect(|name| std::env::var(name).ok())?;
        info!(count = credentials.len(), prefix = %self.prefix, "🔑 Loaded provider credentials");
        Ok(credentials)
    }
}
