//! Trait definitions with mockall annotations for testing
//!
//! External collaborators of the search engine are injected through these
//! traits so the orchestrator can be driven by scripted providers in tests.

use async_trait::async_trait;
use shared::{Entity, RelationshipFinding};

use crate::error::OrchestratorResult;
use crate::types::{ApiFailure, Credential, ProgressUpdate, ProviderRequest, ProviderResponse};

/// External relationship-discovery provider
#[mockall::automock]
#[async_trait]
pub trait DiscoveryProvider: Send + Sync {
    /// Perform one search call with the given credential
    async fn search(&self, credential: &Credential, request: &ProviderRequest) -> Result<ProviderResponse, ApiFailure>;
}

/// Source of provider credentials
#[mockall::automock]
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Load every available credential in stable order
    async fn load_credentials(&self) -> OrchestratorResult<Vec<Credential>>;
}

/// Receives per-entity progress from pool workers
///
/// Called sequentially within a pool; calls from different pools may
/// interleave.
#[mockall::automock]
#[async_trait]
pub trait ProgressObserver: Send + Sync {
    async fn on_progress(&self, update: ProgressUpdate);
}

/// Extracts structured fields from the provider's opaque answer
pub trait AnswerParser: Send + Sync {
    fn parse(&self, entity: &Entity, response: &ProviderResponse) -> Result<RelationshipFinding, ApiFailure>;
}
