//! Core shared types and identifiers

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of one search run
///
/// Callers may supply their own id; otherwise one is generated.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(String);

impl ExecutionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ExecutionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Unique identifier for subscriber connections
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Candidate entity to test for a relationship with the target institution
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub name: String,
    #[serde(default)]
    pub countries: Vec<String>,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            countries: Vec::new(),
        }
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.countries.push(country.into());
        self
    }

    /// First listed country, used to narrow the provider query
    pub fn primary_country(&self) -> Option<&str> {
        self.countries.first().map(String::as_str)
    }
}

/// Optional publication window passed through to the provider
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Lifecycle state of an execution
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    /// Terminal states have no outgoing transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Pending => write!(f, "pending"),
            ExecutionStatus::Processing => write!(f, "processing"),
            ExecutionStatus::Completed => write!(f, "completed"),
            ExecutionStatus::Failed => write!(f, "failed"),
            ExecutionStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A source cited by the provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Structured finding extracted from a provider answer
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipFinding {
    pub relationship_type: Option<String>,
    pub finding_summary: String,
    pub intermediary_organizations: Vec<String>,
    pub sources: Vec<SourceRef>,
}

impl RelationshipFinding {
    pub fn has_relationship(&self) -> bool {
        self.relationship_type.is_some()
    }
}

/// Why an entity ended with a placeholder instead of a finding
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Cancelled,
    NonRetryable,
    RetriesExhausted,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchOutcome {
    Found(RelationshipFinding),
    Failed { reason: FailureReason, message: String },
}

/// One slot of the orchestrator's result list
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityResult {
    pub entity_name: String,
    pub pool_index: usize,
    pub attempts: u32,
    pub outcome: SearchOutcome,
}

impl EntityResult {
    pub fn found(entity_name: impl Into<String>, pool_index: usize, attempts: u32, finding: RelationshipFinding) -> Self {
        Self {
            entity_name: entity_name.into(),
            pool_index,
            attempts,
            outcome: SearchOutcome::Found(finding),
        }
    }

    /// Failure placeholder for an entity that produced no finding
    pub fn placeholder(
        entity_name: impl Into<String>,
        pool_index: usize,
        attempts: u32,
        reason: FailureReason,
        message: impl Into<String>,
    ) -> Self {
        Self {
            entity_name: entity_name.into(),
            pool_index,
            attempts,
            outcome: SearchOutcome::Failed {
                reason,
                message: message.into(),
            },
        }
    }

    pub fn finding(&self) -> Option<&RelationshipFinding> {
        match &self.outcome {
            SearchOutcome::Found(finding) => Some(finding),
            SearchOutcome::Failed { .. } => None,
        }
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match &self.outcome {
            SearchOutcome::Found(_) => None,
            SearchOutcome::Failed { reason, .. } => Some(*reason),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.failure_reason() == Some(FailureReason::Cancelled)
    }
}
