//! Payload-size discipline for `new_result` events
//!
//! Results are shaped in two stages. List fields and the summary are always
//! capped before the frame is measured; if the serialized frame still exceeds
//! the ceiling, emergency truncation shrinks every free-text field and the
//! lists further. The raw provider answer is never part of the payload.

use shared::{EntityResult, EventFrame, ExecutionId, OptimizedResult, ProgressEvent, SearchOutcome, SharedResult};
use tracing::warn;

pub const MAX_ORGANIZATIONS: usize = 3;
pub const MAX_SOURCE_URLS: usize = 5;
pub const MAX_SUMMARY_CHARS: usize = 1000;

pub const EMERGENCY_ORGANIZATIONS: usize = 2;
pub const EMERGENCY_SOURCE_URLS: usize = 3;
pub const EMERGENCY_SUMMARY_CHARS: usize = 500;
pub const EMERGENCY_FIELD_CHARS: usize = 200;

const ELLIPSIS: &str = "...";

/// Truncate to at most `max_chars` characters, marking the cut
pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let mut truncated: String = value.chars().take(keep).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}

fn capped(values: impl Iterator<Item = String>, max_items: usize, max_chars: Option<usize>) -> Vec<String> {
    values
        .take(max_items)
        .map(|value| match max_chars {
            Some(limit) => truncate_chars(&value, limit),
            None => value,
        })
        .collect()
}

/// First-stage shaping: lists capped, summary bounded
pub fn optimize_result(result: &EntityResult) -> OptimizedResult {
    match &result.outcome {
        SearchOutcome::Found(finding) => OptimizedResult {
            entity_name: result.entity_name.clone(),
            found: finding.has_relationship(),
            relationship_type: finding.relationship_type.clone(),
            finding_summary: truncate_chars(&finding.finding_summary, MAX_SUMMARY_CHARS),
            intermediary_organizations: capped(finding.intermediary_organizations.iter().cloned(), MAX_ORGANIZATIONS, None),
            source_urls: capped(finding.sources.iter().map(|s| s.url.clone()), MAX_SOURCE_URLS, None),
            attempts: result.attempts,
            failure: None,
            truncated: false,
        },
        SearchOutcome::Failed { message, .. } => OptimizedResult {
            entity_name: result.entity_name.clone(),
            found: false,
            relationship_type: None,
            finding_summary: String::new(),
            intermediary_organizations: Vec::new(),
            source_urls: Vec::new(),
            attempts: result.attempts,
            failure: Some(truncate_chars(message, MAX_SUMMARY_CHARS)),
            truncated: false,
        },
    }
}

/// Second-stage shaping applied when the frame is over the ceiling
pub fn emergency_truncate(optimized: OptimizedResult) -> OptimizedResult {
    OptimizedResult {
        entity_name: truncate_chars(&optimized.entity_name, EMERGENCY_FIELD_CHARS),
        found: optimized.found,
        relationship_type: optimized
            .relationship_type
            .map(|value| truncate_chars(&value, EMERGENCY_FIELD_CHARS)),
        finding_summary: truncate_chars(&optimized.finding_summary, EMERGENCY_SUMMARY_CHARS),
        intermediary_organizations: capped(
            optimized.intermediary_organizations.into_iter(),
            EMERGENCY_ORGANIZATIONS,
            Some(EMERGENCY_FIELD_CHARS),
        ),
        source_urls: capped(optimized.source_urls.into_iter(), EMERGENCY_SOURCE_URLS, Some(EMERGENCY_FIELD_CHARS)),
        attempts: optimized.attempts,
        failure: optimized.failure.map(|value| truncate_chars(&value, EMERGENCY_FIELD_CHARS)),
        truncated: true,
    }
}

/// Build the `new_result` frame for one entity, honouring `ceiling_bytes`
///
/// Returns the frame together with its NDJSON line.
pub fn new_result_frame(
    execution_id: &ExecutionId,
    result: &EntityResult,
    current: usize,
    total: usize,
    api_index: Option<usize>,
    ceiling_bytes: usize,
) -> SharedResult<(EventFrame, String)> {
    let frame_for = |optimized_result: OptimizedResult| {
        EventFrame::new(
            execution_id.clone(),
            ProgressEvent::NewResult {
                optimized_result,
                current,
                total,
                api_index,
            },
        )
    };

    let optimized = optimize_result(result);
    let frame = frame_for(optimized.clone());
    let line = frame.to_ndjson()?;
    if line.len() <= ceiling_bytes {
        return Ok((frame, line));
    }

    warn!(
        execution = %execution_id,
        entity = %result.entity_name,
        size = line.len(),
        ceiling = ceiling_bytes,
        "new_result payload over ceiling, applying emergency truncation"
    );
    let frame = frame_for(emergency_truncate(optimized));
    let line = frame.to_ndjson()?;
    Ok((frame, line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PAYLOAD_CEILING_BYTES;
    use shared::{FailureReason, RelationshipFinding, SourceRef};

    fn oversized_result(orgs: usize, summary_chars: usize, urls: usize) -> EntityResult {
        EntityResult::found(
            "Acme Corp",
            1,
            2,
            RelationshipFinding {
                relationship_type: Some("Indirect".to_string()),
                finding_summary: "s".repeat(summary_chars),
                intermediary_organizations: (0..orgs).map(|i| format!("Organization {i}")).collect(),
                sources: (0..urls)
                    .map(|i| SourceRef {
                        url: format!("https://example.com/article/{i}"),
                        name: None,
                    })
                    .collect(),
            },
        )
    }

    fn optimized_in(line: &str) -> OptimizedResult {
        let frame: EventFrame = serde_json::from_str(line.trim_end()).unwrap();
        match frame.event {
            ProgressEvent::NewResult { optimized_result, .. } => optimized_result,
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_large_result_is_capped_under_ceiling() {
        let result = oversized_result(50, 10_000, 20);
        let (_, line) =
            new_result_frame(&ExecutionId::from("e1"), &result, 1, 6, Some(0), PAYLOAD_CEILING_BYTES).unwrap();

        assert!(line.len() <= PAYLOAD_CEILING_BYTES);
        let optimized = optimized_in(&line);
        assert!(optimized.intermediary_organizations.len() <= 3);
        assert!(optimized.source_urls.len() <= 5);
        assert!(optimized.finding_summary.chars().count() <= 1000);
    }

    #[test]
    fn test_emergency_truncation_when_ceiling_is_tight() {
        let result = oversized_result(50, 10_000, 20);
        let (_, line) = new_result_frame(&ExecutionId::from("e1"), &result, 1, 6, None, 1200).unwrap();

        let optimized = optimized_in(&line);
        assert!(optimized.truncated);
        assert_eq!(optimized.intermediary_organizations.len(), 2);
        assert_eq!(optimized.source_urls.len(), 3);
        assert!(optimized.finding_summary.chars().count() <= 500);
        assert!(line.len() <= 1200);
    }

    #[test]
    fn test_small_result_is_untouched() {
        let result = oversized_result(2, 100, 1);
        let optimized = optimize_result(&result);

        assert!(!optimized.truncated);
        assert_eq!(optimized.finding_summary.len(), 100);
        assert_eq!(optimized.intermediary_organizations.len(), 2);
        assert!(optimized.found);
    }

    #[test]
    fn test_failure_placeholder_shape() {
        let result = EntityResult::placeholder("Acme", 0, 1, FailureReason::NonRetryable, "unauthorized (403)");
        let optimized = optimize_result(&result);

        assert!(!optimized.found);
        assert_eq!(optimized.failure.as_deref(), Some("unauthorized (403)"));
        assert!(optimized.source_urls.is_empty());
    }

    #[test]
    fn test_truncate_chars_respects_multibyte_boundaries() {
        let value = "é".repeat(20);
        let truncated = truncate_chars(&value, 10);
        assert_eq!(truncated.chars().count(), 10);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncate_chars("short", 10), "short");
    }
}
