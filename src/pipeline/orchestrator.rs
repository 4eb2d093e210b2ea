//! Pipeline orchestrator: runs an item's steps in order.
//!
//! A run moves through the steps until one of them leaves no value (the
//! run halts without output), a step fails and its on-failure policy does
//! not recover, or the last step completes. Only `check-not-supported` may
//! run on an error value.
//!
//! When the run ends in an error that no `set-error` policy produced, the
//! message is rebuilt into a composite report listing every executed step.
//! A run ending in an error also discards the item's step history.

use crate::config::EngineConfig;
use crate::pipeline::cache::ParseCache;
use crate::pipeline::context::ExecutionContext;
use crate::pipeline::executor::StepExecutor;
use crate::pipeline::history::{HistorySlot, StepHistory};
use crate::pipeline::step::{FailureAction, OnFailure, StepKind, StepSpec};
use crate::scripting::CompiledScripts;
use crate::types::{truncate_chars, ItemValueType, Timestamp, Value};
use tracing::debug;

/// An item's preprocessing definition together with its state between runs
#[derive(Debug, Clone)]
pub struct ItemPipeline {
    item_id: u64,
    value_type: ItemValueType,
    steps: Vec<StepSpec>,
    history: Option<StepHistory>,
    scripts: CompiledScripts,
}

impl ItemPipeline {
    pub fn new(item_id: u64, value_type: ItemValueType, steps: Vec<StepSpec>) -> Self {
        Self {
            item_id,
            value_type,
            steps,
            history: None,
            scripts: CompiledScripts::new(),
        }
    }

    pub fn item_id(&self) -> u64 {
        self.item_id
    }

    pub fn value_type(&self) -> ItemValueType {
        self.value_type
    }

    pub fn steps(&self) -> &[StepSpec] {
        &self.steps
    }

    /// True if any step keeps state between runs
    pub fn has_history_steps(&self) -> bool {
        self.steps.iter().any(|step| step.kind.has_history())
    }

    /// History recorded by the last run, if any
    pub fn history(&self) -> Option<&StepHistory> {
        self.history.as_ref()
    }

    pub fn scripts(&self) -> &CompiledScripts {
        &self.scripts
    }

    /// A parse cache for `raw_value` if the first step can use one
    pub fn parse_cache(&self, raw_value: &Value) -> Option<ParseCache> {
        ParseCache::for_steps(&self.steps, raw_value)
    }
}

/// What a single step produced
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    /// Value after the step (and after any on-failure policy)
    pub value: Value,
    /// Policy applied when the step failed; `None` on success
    pub action: Option<FailureAction>,
    /// The step's own error before a policy replaced it
    pub value_before_override: Option<Value>,
}

/// Final value and per-step results of a run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub value: Value,
    pub results: Vec<StepResult>,
}

/// Runs item pipelines within an execution context
pub struct PipelineOrchestrator<'a> {
    ctx: &'a mut ExecutionContext,
}

impl<'a> PipelineOrchestrator<'a> {
    pub fn new(ctx: &'a mut ExecutionContext) -> Self {
        Self { ctx }
    }

    /// Run `pipeline` over `input` collected at `timestamp`.
    ///
    /// With a `cache`, the input is the cache's raw value and `input` is
    /// ignored. The caller keeps its cache reference and releases it.
    pub fn run(
        &mut self,
        pipeline: &mut ItemPipeline,
        cache: Option<&ParseCache>,
        input: &Value,
        timestamp: Timestamp,
    ) -> PipelineOutput {
        let input = cache.map_or(input, ParseCache::raw_value);
        let config = self.ctx.config().clone();

        debug!(
            item_id = pipeline.item_id,
            steps = pipeline.steps.len(),
            value_type = input.type_desc(),
            value = %input.preview(config.log_value_limit),
            cached = cache.is_some(),
            "pipeline started"
        );

        if pipeline.steps.is_empty() {
            return PipelineOutput {
                value: input.clone(),
                results: Vec::new(),
            };
        }

        let mut value = if cache.is_some() { Value::None } else { input.clone() };
        let mut cache = cache;
        let mut results: Vec<StepResult> = Vec::with_capacity(pipeline.steps.len());
        let mut action = FailureAction::Default;
        let mut quote_error = false;

        let mut history_in = pipeline.history.take().unwrap_or_default();
        let mut history_out = StepHistory::new();

        let mut executor = StepExecutor::new(self.ctx, pipeline.value_type, timestamp);

        for (index, step) in pipeline.steps.iter().enumerate() {
            ParseCache::prepare_input(cache, step.kind, &mut value);

            if value.is_error() && step.kind != StepKind::CheckNotSupported {
                break;
            }

            action = FailureAction::Default;
            quote_error = false;

            let mut slot = if step.kind.has_history() {
                HistorySlot::from_entry(history_in.pop(index))
            } else {
                HistorySlot::default()
            };

            let outcome = executor.execute(index, step, &mut value, cache, &mut slot, &mut pipeline.scripts);

            let mut value_before_override = None;
            let step_action = if outcome.is_failure() {
                let raw = value.clone();
                action = apply_on_failure(&step.on_failure, &mut value);
                if action != FailureAction::Default {
                    value_before_override = Some(raw);
                }
                Some(action)
            } else {
                if value.is_error() {
                    quote_error = true;
                }
                None
            };

            results.push(StepResult {
                value: value.clone(),
                action: step_action,
                value_before_override,
            });

            if step.kind.has_history() && !value.is_error() {
                if let Some(entry) = slot.into_entry() {
                    history_out.add(index, entry.value, entry.timestamp);
                }
            }

            cache = None;

            if value.is_none() {
                break;
            }
        }

        if value.is_error() {
            history_out.discard();
            if !results.is_empty() && action != FailureAction::SetError && !quote_error {
                value = Value::Error(format_error(input, &results, &config));
            }
        }

        if pipeline.has_history_steps() {
            pipeline.history = Some(history_out);
        }

        debug!(
            item_id = pipeline.item_id,
            executed = results.len(),
            value_type = value.type_desc(),
            value = %value.preview(config.log_value_limit),
            "pipeline finished"
        );

        PipelineOutput { value, results }
    }
}

impl ExecutionContext {
    /// Run `pipeline` in this context
    pub fn run(
        &mut self,
        pipeline: &mut ItemPipeline,
        cache: Option<&ParseCache>,
        input: &Value,
        timestamp: Timestamp,
    ) -> PipelineOutput {
        PipelineOrchestrator::new(self).run(pipeline, cache, input, timestamp)
    }
}

/// Apply the step's failure policy to its error value
fn apply_on_failure(policy: &OnFailure, value: &mut Value) -> FailureAction {
    match policy {
        OnFailure::Default => {}
        OnFailure::Discard => *value = Value::None,
        OnFailure::SetValue(text) => *value = Value::string(text.clone()),
        OnFailure::SetError(message) => *value = Value::error(message.clone()),
    }
    policy.action()
}

/// Build the composite error report of a failed run.
///
/// The report starts with the input preview; step lines follow in order.
/// When the report is too long the oldest step lines are dropped first.
pub fn format_error(input: &Value, results: &[StepResult], config: &EngineConfig) -> String {
    let shown = input.to_string();
    let mut preview = truncate_chars(&shown, config.value_preview_len);
    if preview.len() < shown.len() {
        preview.push_str("...");
    }
    if preview.is_empty() {
        preview = "<empty string>".to_string();
    }
    let header = format!("Preprocessing failed for: {}", preview);

    let lines: Vec<String> = results
        .iter()
        .enumerate()
        .map(|(i, result)| match &result.value {
            Value::Error(message) => format!("{}. Failed: {}", i + 1, message),
            other => format!("{}. Result: {}", i + 1, other),
        })
        .collect();

    let mut budget = config.max_error_len.saturating_sub(header.len());
    let mut kept: Vec<&str> = Vec::new();
    for line in lines.iter().rev() {
        let needed = line.len() + 1;
        if needed > budget {
            break;
        }
        budget -= needed;
        kept.push(line);
    }

    let mut message = header;
    if kept.len() < lines.len() {
        message.push_str("\n...");
    }
    for line in kept.iter().rev() {
        message.push('\n');
        message.push_str(line);
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline(steps: Vec<StepSpec>) -> ItemPipeline {
        ItemPipeline::new(1, ItemValueType::Float, steps)
    }

    fn run(pipeline: &mut ItemPipeline, input: Value, sec: i64) -> PipelineOutput {
        ExecutionContext::default().run(pipeline, None, &input, Timestamp::from_secs(sec))
    }

    #[test]
    fn test_empty_pipeline_returns_input() {
        let out = run(&mut pipeline(vec![]), Value::string("x"), 1);
        assert_eq!(out.value, Value::string("x"));
        assert!(out.results.is_empty());
    }

    #[test]
    fn test_empty_pipeline_returns_cached_raw_value() {
        let cache = ParseCache::create(StepKind::JsonPath, &Value::string(r#"{"a":1}"#));
        let out = ExecutionContext::default().run(
            &mut pipeline(vec![]),
            Some(&cache),
            &Value::None,
            Timestamp::from_secs(1),
        );
        assert_eq!(out.value, Value::string(r#"{"a":1}"#));
        assert!(out.results.is_empty());
        assert!(cache.release());
    }

    #[test]
    fn test_set_value_continues() {
        let mut p = pipeline(vec![
            StepSpec::new(StepKind::Scale, "2").with_on_failure(OnFailure::SetValue("0".into())),
            StepSpec::new(StepKind::Scale, "10"),
        ]);
        let out = run(&mut p, Value::string("abc"), 1);
        assert_eq!(out.value, Value::Double(0.0));
        assert_eq!(out.results[0].action, Some(FailureAction::SetValue));
        assert!(out.results[0].value_before_override.as_ref().is_some_and(Value::is_error));
    }

    #[test]
    fn test_set_error_is_not_wrapped() {
        let mut p = pipeline(vec![
            StepSpec::new(StepKind::Scale, "2").with_on_failure(OnFailure::SetError("custom".into())),
        ]);
        let out = run(&mut p, Value::string("abc"), 1);
        assert_eq!(out.value, Value::error("custom"));
    }

    #[test]
    fn test_discard_halts() {
        let mut p = pipeline(vec![
            StepSpec::new(StepKind::Scale, "2").with_on_failure(OnFailure::Discard),
            StepSpec::new(StepKind::Scale, "10"),
        ]);
        let out = run(&mut p, Value::string("abc"), 1);
        assert!(out.value.is_none());
        assert_eq!(out.results.len(), 1);
        assert_eq!(out.results[0].action, Some(FailureAction::Discard));
    }

    #[test]
    fn test_default_failure_builds_report() {
        let mut p = pipeline(vec![
            StepSpec::new(StepKind::Scale, "2"),
            StepSpec::new(StepKind::ValidateRange, "0\n10"),
            StepSpec::new(StepKind::Scale, "3"),
        ]);
        let out = run(&mut p, Value::string("21"), 1);
        assert_eq!(
            out.value,
            Value::error(
                "Preprocessing failed for: 21\n1. Result: 42\n2. Failed: value is less than 0 or greater than 10"
            )
        );
        assert_eq!(out.results.len(), 2);
    }

    #[test]
    fn test_check_not_supported_recovers() {
        let mut p = pipeline(vec![
            StepSpec::new(StepKind::CheckNotSupported, "")
                .with_on_failure(OnFailure::SetValue("-1".into())),
            StepSpec::new(StepKind::Scale, "1"),
        ]);
        let out = run(&mut p, Value::error("connection refused"), 1);
        assert_eq!(out.value, Value::Double(-1.0));
    }

    #[test]
    fn test_error_input_passes_through_unmatched_check() {
        let mut p = pipeline(vec![StepSpec::new(StepKind::CheckNotSupported, "0\n^timeout")]);
        let out = run(&mut p, Value::error("connection refused"), 1);
        assert_eq!(out.value, Value::error("connection refused"));
    }

    #[test]
    fn test_history_persists_and_is_discarded_on_error() {
        let mut p = pipeline(vec![StepSpec::new(StepKind::DeltaChange, "")]);
        let mut ctx = ExecutionContext::default();

        let out = ctx.run(&mut p, None, &Value::string("10"), Timestamp::from_secs(1));
        assert!(out.value.is_none());
        assert_eq!(p.history().map(StepHistory::len), Some(1));

        let out = ctx.run(&mut p, None, &Value::string("15"), Timestamp::from_secs(2));
        assert_eq!(out.value, Value::Double(5.0));

        let out = ctx.run(&mut p, None, &Value::string("bad"), Timestamp::from_secs(3));
        assert!(out.value.is_error());
        assert_eq!(p.history().map(StepHistory::len), Some(0));

        let out = ctx.run(&mut p, None, &Value::string("20"), Timestamp::from_secs(4));
        assert!(out.value.is_none());
    }

    #[test]
    fn test_no_history_without_stateful_steps() {
        let mut p = pipeline(vec![
            StepSpec::new(StepKind::Trim, " "),
            StepSpec::new(StepKind::Scale, "2"),
        ]);
        let out = run(&mut p, Value::string(" 4 "), 1);
        assert_eq!(out.value, Value::Double(8.0));
        assert!(p.history().is_none());

        run(&mut p, Value::string("bad"), 2);
        assert!(p.history().is_none());
    }

    #[test]
    fn test_report_preview_and_cap() {
        let config = EngineConfig {
            value_preview_len: 3,
            max_error_len: 60,
            ..EngineConfig::default()
        };
        let results: Vec<StepResult> = (0..5)
            .map(|i| StepResult {
                value: Value::error(format!("error number {}", i)),
                action: Some(FailureAction::Default),
                value_before_override: None,
            })
            .collect();

        let report = format_error(&Value::string("abcdef"), &results, &config);
        assert!(report.starts_with("Preprocessing failed for: abc...\n...\n"));
        assert!(report.ends_with("5. Failed: error number 4"));
        assert!(report.len() <= 60 + "\n...".len());

        let report = format_error(&Value::string(""), &results[..1], &EngineConfig::default());
        assert_eq!(report, "Preprocessing failed for: <empty string>\n1. Failed: error number 0");
    }
}
