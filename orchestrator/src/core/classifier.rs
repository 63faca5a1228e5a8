//! Failure classification and the rolling error log
//!
//! Retry decisions come from the typed `ApiFailure`; severity is derived for
//! reporting only.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::ApiFailure;

/// Minimum wait after a rate-limit response
pub const RATE_LIMIT_FLOOR: Duration = Duration::from_secs(5);

/// Default capacity of the rolling error log
pub const DEFAULT_ERROR_LOG_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Back off and try again; `floor` raises the minimum delay
    Retry { floor: Option<Duration> },
    Fail,
}

/// Decide whether a failed attempt may be retried
pub fn retry_decision(failure: &ApiFailure) -> RetryDecision {
    match failure {
        ApiFailure::Timeout | ApiFailure::Network(_) | ApiFailure::Server { .. } => {
            RetryDecision::Retry { floor: None }
        }
        ApiFailure::RateLimited { retry_after } => RetryDecision::Retry {
            floor: Some(retry_after.map_or(RATE_LIMIT_FLOOR, |hint| hint.max(RATE_LIMIT_FLOOR))),
        },
        ApiFailure::Unauthorized { .. }
        | ApiFailure::NotFound
        | ApiFailure::Client { .. }
        | ApiFailure::MalformedResponse(_) => RetryDecision::Fail,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Medium,
    High,
    Critical,
}

/// Severity of a typed provider failure
pub fn severity_of(failure: &ApiFailure) -> Severity {
    match failure {
        ApiFailure::Timeout | ApiFailure::Network(_) | ApiFailure::Server { .. } => Severity::Critical,
        ApiFailure::Unauthorized { .. } => Severity::High,
        ApiFailure::RateLimited { .. } => Severity::Medium,
        _ => Severity::Medium,
    }
}

/// Severity of an arbitrary error message
pub fn severity_of_message(message: &str) -> Severity {
    let lower = message.to_lowercase();
    let contains_any = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if contains_any(&["timeout", "timed out", "network", "connection", "500", "502", "503", "504", "server error"]) {
        Severity::Critical
    } else if contains_any(&["401", "403", "unauthorized", "forbidden", "permission", "auth"]) {
        Severity::High
    } else {
        Severity::Medium
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub context: String,
    pub message: String,
}

/// Bounded most-recent-N error log, independent of execution records
#[derive(Debug)]
pub struct ErrorLog {
    capacity: usize,
    entries: Mutex<VecDeque<ErrorReport>>,
}

impl ErrorLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    pub fn report(&self, severity: Severity, context: impl Into<String>, message: impl Into<String>) {
        let report = ErrorReport {
            timestamp: Utc::now(),
            severity,
            context: context.into(),
            message: message.into(),
        };

        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(report);
    }

    /// Record a provider failure, returning its severity
    pub fn report_failure(&self, context: impl Into<String>, failure: &ApiFailure) -> Severity {
        let severity = severity_of(failure);
        self.report(severity, context, failure.to_string());
        severity
    }

    /// Record an error message, classifying it by content
    pub fn report_message(&self, context: impl Into<String>, message: impl Into<String>) -> Severity {
        let message = message.into();
        let severity = severity_of_message(&message);
        self.report(severity, context, message);
        severity
    }

    /// Most recent reports, newest last
    pub fn recent(&self) -> Vec<ErrorReport> {
        let entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_LOG_CAPACITY)
    }
}
