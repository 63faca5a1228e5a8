//! Search engine data types

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared::{DateRange, Entity, EntityResult};

/// One external-search credential; its index is the pool it drives
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub index: usize,
    pub label: String,
    pub api_key: String,
}

impl Credential {
    pub fn new(index: usize, label: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            index,
            label: label.into(),
            api_key: api_key.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("index", &self.index)
            .field("label", &self.label)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Classified provider failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiFailure {
    Timeout,
    Network(String),
    Server { status: u16 },
    RateLimited { retry_after: Option<Duration> },
    Unauthorized { status: u16 },
    NotFound,
    Client { status: u16, message: String },
    MalformedResponse(String),
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiFailure::Timeout => write!(f, "request timeout"),
            ApiFailure::Network(message) => write!(f, "network error: {message}"),
            ApiFailure::Server { status } => write!(f, "server error ({status})"),
            ApiFailure::RateLimited { .. } => write!(f, "rate limit exceeded (429)"),
            ApiFailure::Unauthorized { status } => write!(f, "unauthorized ({status})"),
            ApiFailure::NotFound => write!(f, "not found (404)"),
            ApiFailure::Client { status, message } => write!(f, "client error ({status}): {message}"),
            ApiFailure::MalformedResponse(message) => write!(f, "malformed response: {message}"),
        }
    }
}

/// Request body sent to the relationship-discovery provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRequest {
    pub query: String,
    pub depth: String,
    pub output_type: String,
    pub exclude_domains: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSource {
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
}

/// Raw provider response; never forwarded to subscribers as-is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<ProviderSource>,
}

/// Input to one orchestration run
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub target_institution: String,
    pub region: Option<String>,
    pub entities: Vec<Entity>,
    pub date_range: Option<DateRange>,
}

/// Ordered subset of entities bound to one credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pool {
    pub index: usize,
    pub entities: Vec<Entity>,
}

impl Pool {
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Reported after every entity attempt that reached a terminal outcome
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub pool_index: usize,
    /// Entities finished so far in this pool
    pub pool_completed: usize,
    pub pool_total: usize,
    /// Entities finished so far across all pools
    pub global_completed: usize,
    pub total: usize,
    pub result: EntityResult,
}
