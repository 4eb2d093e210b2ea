//! Step executor: runs one step over the current value.
//!
//! Dispatch is an exhaustive `match` over [`StepKind`]. A step that fails
//! leaves `Value::Error` in place of the value and reports
//! [`StepOutcome::Failed`]; applying the on-failure policy is the
//! orchestrator's job.

use crate::pipeline::cache::ParseCache;
use crate::pipeline::context::ExecutionContext;
use crate::pipeline::history::HistorySlot;
use crate::pipeline::step::{StepKind, StepSpec};
use crate::pipeline::steps::{csv, numeric, script, snmp, structured, text, throttle, validate};
use crate::scripting::CompiledScripts;
use crate::types::{ItemValueType, Timestamp, Value};
use tracing::debug;

/// Result of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded,
    Failed,
}

impl StepOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, StepOutcome::Failed)
    }
}

/// Executes steps for one pipeline run
pub struct StepExecutor<'a> {
    ctx: &'a mut ExecutionContext,
    value_type: ItemValueType,
    timestamp: Timestamp,
}

impl<'a> StepExecutor<'a> {
    pub fn new(ctx: &'a mut ExecutionContext, value_type: ItemValueType, timestamp: Timestamp) -> Self {
        Self {
            ctx,
            value_type,
            timestamp,
        }
    }

    pub fn context(&self) -> &ExecutionContext {
        self.ctx
    }

    /// Run step `index` over `value`.
    ///
    /// `cache` is only consulted by cacheable kinds, `history` only by
    /// stateful kinds and `scripts` only by script steps.
    pub fn execute(
        &mut self,
        index: usize,
        step: &StepSpec,
        value: &mut Value,
        cache: Option<&ParseCache>,
        history: &mut HistorySlot,
        scripts: &mut CompiledScripts,
    ) -> StepOutcome {
        let limit = self.ctx.config().log_value_limit;
        debug!(
            index,
            kind = %step.kind,
            params = %step.params,
            value_type = value.type_desc(),
            value = %value.preview(limit),
            "step started"
        );

        let result = self.dispatch(index, step, value, cache, history, scripts);

        let outcome = match result {
            Ok(()) => StepOutcome::Succeeded,
            Err(message) => {
                *value = Value::Error(message);
                StepOutcome::Failed
            }
        };

        debug!(
            index,
            kind = %step.kind,
            ?outcome,
            value_type = value.type_desc(),
            value = %value.preview(limit),
            "step finished"
        );
        outcome
    }

    fn dispatch(
        &mut self,
        index: usize,
        step: &StepSpec,
        value: &mut Value,
        cache: Option<&ParseCache>,
        history: &mut HistorySlot,
        scripts: &mut CompiledScripts,
    ) -> Result<(), String> {
        let params = step.params.as_str();
        let value_type = self.value_type;
        let timestamp = self.timestamp;
        let collaborators = self.ctx.collaborators().clone();

        match step.kind {
            StepKind::Scale => numeric::scale(value, value_type, params),
            StepKind::TrimRight | StepKind::TrimLeft | StepKind::Trim => text::trim(value, step.kind, params),
            StepKind::RegexSubstitute => text::regex_substitute(value, params),
            StepKind::BoolToDecimal | StepKind::OctToDecimal | StepKind::HexToDecimal => {
                numeric::to_decimal(value, step.kind)
            }
            StepKind::DeltaChange => numeric::delta(value, value_type, timestamp, false, history),
            StepKind::DeltaSpeed => numeric::delta(value, value_type, timestamp, true, history),
            StepKind::Xpath => structured::xpath(value, params, collaborators.xml()),
            StepKind::JsonPath => structured::json_path(value, params, cache, collaborators.json.as_ref()),
            StepKind::ValidateRange => validate::validate_range(value, value_type, params),
            StepKind::ValidateRegex => validate::validate_regex(value, params, false),
            StepKind::ValidateNotRegex => validate::validate_regex(value, params, true),
            StepKind::CheckNotSupported => validate::check_not_supported(value, params),
            StepKind::ErrorFromJson => validate::error_from_json(value, params, collaborators.json.as_ref()),
            StepKind::ErrorFromXml => validate::error_from_xml(value, params, collaborators.xml()),
            StepKind::ErrorFromRegex => validate::error_from_regex(value, params),
            StepKind::Throttle => throttle::throttle(value, timestamp, history),
            StepKind::ThrottleTimed => throttle::throttle_timed(value, timestamp, params, history),
            StepKind::Script => script::script(value, params, index, self.ctx, scripts),
            StepKind::MetricPattern => {
                structured::metric_pattern(value, params, cache, collaborators.metrics.as_ref())
            }
            StepKind::MetricToJson => {
                structured::metric_to_json(value, params, cache, collaborators.metrics.as_ref())
            }
            StepKind::CsvToJson => csv::csv_to_json(value, params),
            StepKind::XmlToJson => structured::xml_to_json(value, collaborators.xml()),
            StepKind::StringReplace => text::string_replace(value, params),
            StepKind::SnmpWalkValue => snmp::walk_value(value, params, cache, collaborators.snmp.as_ref()),
            StepKind::SnmpWalkToJson => snmp::walk_to_json(value, params, collaborators.snmp.as_ref()),
            StepKind::SnmpGetValue => snmp::get_value(value, params),
        }
    }
}
