//! Orchestrator library for bulk relationship-discovery searches
//!
//! This library partitions a batch of candidate entities across provider
//! credentials, runs one sequential pool per credential concurrently with
//! retry and cancellation, and tracks every run in an execution registry.

pub mod config;
pub mod core;
pub mod error;
pub mod orchestrator;
pub mod services;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::{ProviderSettings, RegistryConfig, SearchConfig};
pub use core::{
    ErrorLog, ErrorReport, ExecutionMetrics, ExecutionRegistry, ExecutionSnapshot, ExecutionUpdate, Severity,
    SweepReport,
};
pub use error::{AbortReason, OrchestratorError, OrchestratorResult};
pub use orchestrator::SearchOrchestrator;
pub use services::{RealCredentialSource, RealDiscoveryProvider, StructuredAnswerParser};
pub use traits::{AnswerParser, CredentialSource, DiscoveryProvider, ProgressObserver};
pub use types::{ApiFailure, BatchRequest, Credential, Pool, ProgressUpdate, ProviderRequest, ProviderResponse, ProviderSource};
