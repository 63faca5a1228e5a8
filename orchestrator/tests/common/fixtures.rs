//! Test fixtures and data for orchestrator tests
//!
//! This module provides consistent test data and fixtures used across all test suites.

use orchestrator::{BatchRequest, Credential, ProviderResponse, SearchConfig};
use shared::Entity;

/// Standard test data and fixtures
pub struct TestFixtures;

impl TestFixtures {
    pub const INSTITUTION: &'static str = "Example University";
    pub const REGION: &'static str = "Canada";

    /// Zero-padded so no name is a substring of another
    pub fn entity_name(index: usize) -> String {
        format!("Entity-{index:03}")
    }

    pub fn entities(count: usize) -> Vec<Entity> {
        (0..count).map(|i| Entity::new(Self::entity_name(i))).collect()
    }

    pub fn credentials(count: usize) -> Vec<Credential> {
        (0..count)
            .map(|i| Credential::new(i, format!("key-{i}"), format!("secret-{i}")))
            .collect()
    }

    pub fn batch(count: usize) -> BatchRequest {
        BatchRequest {
            target_institution: Self::INSTITUTION.to_string(),
            region: Some(Self::REGION.to_string()),
            entities: Self::entities(count),
            date_range: None,
        }
    }

    pub fn config() -> SearchConfig {
        SearchConfig::default()
    }

    /// A structured answer reporting a direct relationship
    pub fn direct_answer(summary: &str) -> ProviderResponse {
        ProviderResponse {
            answer: format!(
                r#"{{"relationship_type":"Direct","finding_summary":"{summary}","intermediary_organizations":[]}}"#
            ),
            sources: Vec::new(),
        }
    }
}
