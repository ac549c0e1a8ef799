//! Integration tests for structured output: repair pipeline, provider schemas, validation.

use serde_json::json;
use wellness_ai_gateway::operations::records::{RawComicScript, RawJournalInsights, RawPeerModeration};
use wellness_ai_gateway::structured::{parse_structured, provider_schema, repair, OutputValidator, RepairStep};
use wellness_ai_gateway::ErrorKind;

#[test]
fn fenced_json_with_prose_and_trailing_comma() {
    let raw = "Here you go!\n```json\n{\"a\":1,}\n```";
    assert_eq!(parse_structured(raw).unwrap(), json!({"a": 1}));
}

#[test]
fn text_without_braces_fails() {
    for raw in ["", "no json at all", "[1, 2, 3]", "```\njust words\n```"] {
        let err = parse_structured(raw).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StructuredOutput, "input {:?}", raw);
    }
}

#[test]
fn each_repair_step_is_reported() {
    let cases = [
        (r#"{"a": 1}"#, RepairStep::Direct),
        ("```json\n{\"a\": 1}\n```", RepairStep::StrippedFence),
        ("Sure thing: {\"a\": 1} hope it helps", RepairStep::IsolatedObject),
        ("{\"a\": [1, 2,], }", RepairStep::RemovedTrailingCommas),
        ("{'a': 'x'}", RepairStep::SwappedQuotes),
    ];
    for (raw, expected) in cases {
        let (value, step) = repair(raw).unwrap();
        assert_eq!(step, expected, "input {:?}", raw);
        assert!(value.is_object());
    }
}

#[test]
fn quote_swap_is_skipped_when_double_quotes_present() {
    // two double quotes present: single quotes are content, not delimiters
    let err = parse_structured(r#"{'a': "x"}"#).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StructuredOutput);
}

#[test]
fn repair_never_invents_fields() {
    let value = parse_structured("```json\n{\"summary\": \"ok\",}\n```").unwrap();
    assert_eq!(value.as_object().unwrap().len(), 1);
}

#[test]
fn provider_schemas_are_reduced() {
    let schema = provider_schema::<RawJournalInsights>();
    let text = schema.to_string();
    assert!(!text.contains("$schema"));
    assert!(!text.contains("additionalProperties"));
    assert_eq!(schema["type"], "object");
    assert_eq!(schema["required"], json!(["summary"]));
    assert_eq!(schema["properties"]["scores"]["properties"]["motivated"]["type"], "number");
    assert_eq!(schema["properties"]["confidence"]["type"], "number");

    let comic = provider_schema::<RawComicScript>();
    assert_eq!(comic["properties"]["panels"]["type"], "array");
    assert_eq!(comic["properties"]["panels"]["items"]["type"], "object");
    assert!(comic["properties"]["panels"]["items"]["properties"]["dialogue"].is_object());

    let moderation = provider_schema::<RawPeerModeration>();
    assert_eq!(moderation["properties"]["suggested_rewrite"]["type"], "string");
    assert_eq!(moderation["properties"]["suggested_rewrite"]["nullable"], true);
}

#[test]
fn validator_accepts_lenient_scores_and_rejects_wrong_types() {
    let validator = OutputValidator::for_type::<RawJournalInsights>("JournalInsights").unwrap();
    validator
        .validate(&json!({"summary": "ok", "scores": {"calm": "high", "sad": 3}, "confidence": "n/a"}))
        .unwrap();

    let err = validator
        .validate(&json!({"summary": 5, "keywords": "not a list"}))
        .unwrap_err();
    let text = err.to_string();
    assert!(text.contains("/summary"));
    assert!(text.contains("/keywords"));
}
