//! Integration tests for the shared parse cache
//!
//! Several items reading the same raw value share one parsed document:
//! - The collaborator parses once per cache, not once per item
//! - A parse failure is remembered for every sharer
//! - Copies and releases are balanced

mod common;

use common::builders::PipelineBuilder;
use common::error_text;
use common::mock_helpers::MockJson;
use preproc_rs::config::EngineConfig;
use preproc_rs::pipeline::{ExecutionContext, ParseCache, StepKind};
use preproc_rs::query::{BuiltinJsonPath, Collaborators, JsonQuery};
use preproc_rs::types::{ItemValueType, Timestamp, Value};
use std::sync::Arc;

const PAYLOAD: &str = r#"{"a":"1","b":2,"nested":{"c":[10,20]}}"#;

fn context_with(json: MockJson) -> ExecutionContext {
    ExecutionContext::new(EngineConfig::default())
        .with_collaborators(Collaborators::default().with_json(Arc::new(json)))
}

#[test]
fn test_two_items_parse_once() {
    let mut json = MockJson::new();
    json.expect_open().times(1).returning(|text| BuiltinJsonPath.open(text));
    json.expect_query()
        .times(2)
        .returning(|doc, path| BuiltinJsonPath.query(doc, path));
    let mut ctx = context_with(json);

    let mut first = PipelineBuilder::new(ItemValueType::Text)
        .item_id(1)
        .step(StepKind::JsonPath, "$.a")
        .build();
    let mut second = PipelineBuilder::new(ItemValueType::Unsigned)
        .item_id(2)
        .step(StepKind::JsonPath, "$.b")
        .build();

    let raw = Value::string(PAYLOAD);
    let cache = first.parse_cache(&raw).unwrap();
    let shared = cache.copy();
    assert_eq!(cache.ref_count(), 2);

    let now = Timestamp::from_secs(1);
    let out = ctx.run(&mut first, Some(&cache), &Value::None, now);
    assert_eq!(out.value, Value::string("1"));
    assert!(cache.has_artifact());

    let out = ctx.run(&mut second, Some(&shared), &Value::None, now);
    assert_eq!(out.value, Value::string("2"));

    assert!(!shared.release());
    assert!(cache.release());
}

#[test]
fn test_parse_failure_is_remembered() {
    let mut json = MockJson::new();
    json.expect_open()
        .times(1)
        .returning(|_| Err("unexpected character".to_string()));
    json.expect_query().never();
    let mut ctx = context_with(json);

    let mut first = PipelineBuilder::new(ItemValueType::Text)
        .step(StepKind::JsonPath, "$.a")
        .build();
    let mut second = PipelineBuilder::new(ItemValueType::Text)
        .step(StepKind::JsonPath, "$.b")
        .build();

    let cache = ParseCache::create(StepKind::JsonPath, &Value::string("not json"));
    let now = Timestamp::from_secs(1);

    let a = ctx.run(&mut first, Some(&cache), &Value::None, now);
    let b = ctx.run(&mut second, Some(&cache), &Value::None, now);

    assert!(error_text(&a.value).ends_with("unexpected character"));
    assert!(error_text(&b.value).ends_with("unexpected character"));
    // the composite error quotes the raw value, not the missing input
    assert!(error_text(&b.value).starts_with("Preprocessing failed for: not json\n"));
}

#[test]
fn test_cache_feeds_first_step_only() {
    let mut json = MockJson::new();
    json.expect_open().times(2).returning(|text| BuiltinJsonPath.open(text));
    json.expect_query()
        .times(2)
        .returning(|doc, path| BuiltinJsonPath.query(doc, path));
    let mut ctx = context_with(json);

    // the second json-path step parses its own input
    let mut pipeline = PipelineBuilder::new(ItemValueType::Text)
        .step(StepKind::JsonPath, "$.nested")
        .step(StepKind::JsonPath, "$.c[1]")
        .build();

    let raw = Value::string(PAYLOAD);
    let cache = pipeline.parse_cache(&raw).unwrap();
    let out = ctx.run(&mut pipeline, Some(&cache), &Value::None, Timestamp::from_secs(1));
    assert_eq!(out.value, Value::string("20"));
    assert!(cache.release());
}

#[test]
fn test_no_cache_when_first_step_cannot_use_it() {
    let pipeline = PipelineBuilder::new(ItemValueType::Text)
        .step(StepKind::Trim, " ")
        .step(StepKind::JsonPath, "$.a")
        .build();
    assert!(pipeline.parse_cache(&Value::string(PAYLOAD)).is_none());
}

#[test]
fn test_metric_items_share_table() {
    let text = "# TYPE temperature gauge\ntemperature 21.5\nhumidity 40\n";
    let mut ctx = ExecutionContext::new(EngineConfig::default());

    let mut temperature = PipelineBuilder::new(ItemValueType::Float)
        .step(StepKind::MetricPattern, "temperature\nvalue\n")
        .build();
    let mut humidity = PipelineBuilder::new(ItemValueType::Float)
        .step(StepKind::MetricPattern, "humidity\nvalue\n")
        .build();

    let cache = temperature.parse_cache(&Value::string(text)).unwrap();
    let now = Timestamp::from_secs(1);

    let out = ctx.run(&mut temperature, Some(&cache), &Value::None, now);
    assert_eq!(out.value, Value::string("21.5"));
    assert!(cache.has_artifact());

    let out = ctx.run(&mut humidity, Some(&cache), &Value::None, now);
    assert_eq!(out.value, Value::string("40"));
    assert!(cache.release());
}
