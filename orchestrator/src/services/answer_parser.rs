//! Structured extraction from provider answers
//!
//! The provider is asked to answer in JSON, but it may wrap the object in a
//! fenced code block or ignore the request entirely. Free text is kept as
//! the summary with no relationship type.

use serde::Deserialize;
use shared::{Entity, RelationshipFinding, SourceRef};

use crate::traits::AnswerParser;
use crate::types::{ApiFailure, ProviderResponse};

#[derive(Debug, Default, Deserialize)]
struct StructuredAnswer {
    #[serde(default)]
    relationship_type: Option<String>,
    #[serde(default)]
    finding_summary: Option<String>,
    #[serde(default)]
    intermediary_organizations: Vec<String>,
}

/// Parser for the JSON answer format requested by [`build_query`](crate::core::build_query)
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredAnswerParser;

impl StructuredAnswerParser {
    pub fn new() -> Self {
        Self
    }

    /// Locate a JSON object in `answer`, preferring a ```json fence
    fn json_candidate(answer: &str) -> Option<&str> {
        if let Some(start) = answer.find("```") {
            let after_fence = &answer[start + 3..];
            let body_start = after_fence.find('\n').map_or(0, |i| i + 1);
            let body = &after_fence[body_start..];
            if let Some(end) = body.find("```") {
                return Some(body[..end].trim());
            }
        }

        let open = answer.find('{')?;
        let close = answer.rfind('}')?;
        (close > open).then(|| &answer[open..=close])
    }

    fn normalize_relationship(value: Option<String>) -> Option<String> {
        let value = value?.trim().to_string();
        match value.to_lowercase().as_str() {
            "" | "none" | "null" | "no" | "no relationship" => None,
            _ => Some(value),
        }
    }
}

impl AnswerParser for StructuredAnswerParser {
    fn parse(&self, entity: &Entity, response: &ProviderResponse) -> Result<RelationshipFinding, ApiFailure> {
        let answer = response.answer.trim();
        if answer.is_empty() {
            return Err(ApiFailure::MalformedResponse(format!("empty answer for {}", entity.name)));
        }

        let sources = response
            .sources
            .iter()
            .filter(|source| !source.url.is_empty())
            .map(|source| SourceRef {
                url: source.url.clone(),
                name: source.name.clone(),
            })
            .collect();

        let structured = Self::json_candidate(answer).and_then(|candidate| serde_json::from_str::<StructuredAnswer>(candidate).ok());

        let finding = match structured {
            Some(parsed) => RelationshipFinding {
                relationship_type: Self::normalize_relationship(parsed.relationship_type),
                finding_summary: parsed.finding_summary.unwrap_or_default(),
                intermediary_organizations: parsed
                    .intermediary_organizations
                    .into_iter()
                    .filter(|org| !org.trim().is_empty())
                    .collect(),
                sources,
            },
            None => RelationshipFinding {
                relationship_type: None,
                finding_summary: answer.to_string(),
                intermediary_organizations: Vec::new(),
                sources,
            },
        };
        Ok(finding)
    }
}
