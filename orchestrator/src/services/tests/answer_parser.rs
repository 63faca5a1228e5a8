//! Tests for StructuredAnswerParser

use shared::Entity;

use crate::services::answer_parser::StructuredAnswerParser;
use crate::traits::AnswerParser;
use crate::types::{ApiFailure, ProviderResponse, ProviderSource};

fn response(answer: &str) -> ProviderResponse {
    ProviderResponse {
        answer: answer.to_string(),
        sources: vec![
            ProviderSource {
                url: "https://news.example.com/a".to_string(),
                name: Some("Example News".to_string()),
                snippet: Some("snippet".to_string()),
            },
            ProviderSource {
                url: String::new(),
                name: None,
                snippet: None,
            },
        ],
    }
}

#[test]
fn test_plain_json_answer() {
    let parser = StructuredAnswerParser::new();
    let answer = r#"{"relationship_type":"Indirect","finding_summary":"Joint grant via a consortium","intermediary_organizations":["Consortium X",""]}"#;

    let finding = parser.parse(&Entity::new("Acme"), &response(answer)).unwrap();

    assert_eq!(finding.relationship_type.as_deref(), Some("Indirect"));
    assert_eq!(finding.finding_summary, "Joint grant via a consortium");
    assert_eq!(finding.intermediary_organizations, vec!["Consortium X".to_string()]);
    assert_eq!(finding.sources.len(), 1);
    assert_eq!(finding.sources[0].name.as_deref(), Some("Example News"));
}

#[test]
fn test_fenced_json_answer() {
    let parser = StructuredAnswerParser::new();
    let answer = "Here is what I found:\n```json\n{\"relationship_type\": \"Direct\", \"finding_summary\": \"Research partnership\"}\n```\nHope this helps.";

    let finding = parser.parse(&Entity::new("Acme"), &response(answer)).unwrap();

    assert_eq!(finding.relationship_type.as_deref(), Some("Direct"));
    assert_eq!(finding.finding_summary, "Research partnership");
    assert!(finding.intermediary_organizations.is_empty());
}

#[test]
fn test_null_like_relationship_means_none() {
    let parser = StructuredAnswerParser::new();
    for value in ["null", "\"None\"", "\"no relationship\"", "\"\""] {
        let answer = format!(r#"{{"relationship_type": {value}, "finding_summary": "nothing found"}}"#);
        let finding = parser.parse(&Entity::new("Acme"), &response(&answer)).unwrap();
        assert!(!finding.has_relationship(), "{value}");
    }
}

#[test]
fn test_free_text_becomes_summary() {
    let parser = StructuredAnswerParser::new();
    let finding = parser
        .parse(&Entity::new("Acme"), &response("No public connection was found."))
        .unwrap();

    assert_eq!(finding.relationship_type, None);
    assert_eq!(finding.finding_summary, "No public connection was found.");
}

#[test]
fn test_empty_answer_is_malformed() {
    let parser = StructuredAnswerParser::new();
    let err = parser.parse(&Entity::new("Acme"), &response("   ")).unwrap_err();
    assert!(matches!(err, ApiFailure::MalformedResponse(_)));
}
