//! Test fixtures for webserver service tests

use orchestrator::{Credential, ProviderResponse, SearchConfig};
use shared::{Entity, ExecutionId};

use crate::types::StartSearchRequest;

pub const INSTITUTION: &str = "Example University";
pub const OWNER: &str = "owner-1";

/// Zero-padded so no name is a substring of another
pub fn entity_name(index: usize) -> String {
    format!("Entity-{index:03}")
}

pub fn start_request(execution_id: &str, entity_count: usize) -> StartSearchRequest {
    StartSearchRequest {
        execution_id: Some(ExecutionId::from(execution_id)),
        owner_id: OWNER.to_string(),
        target_institution: INSTITUTION.to_string(),
        region: Some("Canada".to_string()),
        entities: (0..entity_count).map(|i| Entity::new(entity_name(i))).collect(),
        date_range: None,
    }
}

pub fn credentials(count: usize) -> Vec<Credential> {
    (0..count)
        .map(|i| Credential::new(i, format!("key-{i}"), format!("secret-{i}")))
        .collect()
}

pub fn search_config() -> SearchConfig {
    SearchConfig::default()
}

pub fn direct_answer(entity: &str) -> ProviderResponse {
    ProviderResponse {
        answer: format!(
            r#"{{"relationship_type":"Direct","finding_summary":"{entity} funds a lab","intermediary_organizations":[]}}"#
        ),
        sources: Vec::new(),
    }
}
