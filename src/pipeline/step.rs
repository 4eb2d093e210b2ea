//! Step definitions: what a pipeline is made of.
//!
//! A [`StepSpec`] is immutable configuration. The closed set of step kinds is
//! an enum so that dispatch in the executor is an exhaustive `match`.

use crate::pipeline::steps;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a preprocessing step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    Scale,
    TrimRight,
    TrimLeft,
    Trim,
    RegexSubstitute,
    BoolToDecimal,
    OctToDecimal,
    HexToDecimal,
    DeltaChange,
    DeltaSpeed,
    Xpath,
    JsonPath,
    ValidateRange,
    ValidateRegex,
    ValidateNotRegex,
    CheckNotSupported,
    ErrorFromJson,
    ErrorFromXml,
    ErrorFromRegex,
    Throttle,
    ThrottleTimed,
    Script,
    MetricPattern,
    MetricToJson,
    CsvToJson,
    XmlToJson,
    StringReplace,
    SnmpWalkValue,
    SnmpWalkToJson,
    SnmpGetValue,
}

impl StepKind {
    /// All step kinds, in configuration order
    pub const ALL: [StepKind; 30] = [
        StepKind::Scale,
        StepKind::TrimRight,
        StepKind::TrimLeft,
        StepKind::Trim,
        StepKind::RegexSubstitute,
        StepKind::BoolToDecimal,
        StepKind::OctToDecimal,
        StepKind::HexToDecimal,
        StepKind::DeltaChange,
        StepKind::DeltaSpeed,
        StepKind::Xpath,
        StepKind::JsonPath,
        StepKind::ValidateRange,
        StepKind::ValidateRegex,
        StepKind::ValidateNotRegex,
        StepKind::CheckNotSupported,
        StepKind::ErrorFromJson,
        StepKind::ErrorFromXml,
        StepKind::ErrorFromRegex,
        StepKind::Throttle,
        StepKind::ThrottleTimed,
        StepKind::Script,
        StepKind::MetricPattern,
        StepKind::MetricToJson,
        StepKind::CsvToJson,
        StepKind::XmlToJson,
        StepKind::StringReplace,
        StepKind::SnmpWalkValue,
        StepKind::SnmpWalkToJson,
        StepKind::SnmpGetValue,
    ];

    /// Configuration name of this kind
    pub fn name(&self) -> &'static str {
        match self {
            StepKind::Scale => "scale",
            StepKind::TrimRight => "trim-right",
            StepKind::TrimLeft => "trim-left",
            StepKind::Trim => "trim",
            StepKind::RegexSubstitute => "regex-substitute",
            StepKind::BoolToDecimal => "bool-to-decimal",
            StepKind::OctToDecimal => "oct-to-decimal",
            StepKind::HexToDecimal => "hex-to-decimal",
            StepKind::DeltaChange => "delta-change",
            StepKind::DeltaSpeed => "delta-speed",
            StepKind::Xpath => "xpath",
            StepKind::JsonPath => "json-path",
            StepKind::ValidateRange => "validate-range",
            StepKind::ValidateRegex => "validate-regex",
            StepKind::ValidateNotRegex => "validate-not-regex",
            StepKind::CheckNotSupported => "check-not-supported",
            StepKind::ErrorFromJson => "error-from-json",
            StepKind::ErrorFromXml => "error-from-xml",
            StepKind::ErrorFromRegex => "error-from-regex",
            StepKind::Throttle => "throttle",
            StepKind::ThrottleTimed => "throttle-timed",
            StepKind::Script => "script",
            StepKind::MetricPattern => "metric-pattern",
            StepKind::MetricToJson => "metric-to-json",
            StepKind::CsvToJson => "csv-to-json",
            StepKind::XmlToJson => "xml-to-json",
            StepKind::StringReplace => "string-replace",
            StepKind::SnmpWalkValue => "snmp-walk-value",
            StepKind::SnmpWalkToJson => "snmp-walk-to-json",
            StepKind::SnmpGetValue => "snmp-get-value",
        }
    }

    /// Steps that carry a (value, timestamp) entry between runs
    pub fn has_history(&self) -> bool {
        matches!(
            self,
            StepKind::DeltaChange | StepKind::DeltaSpeed | StepKind::Throttle | StepKind::ThrottleTimed
        )
    }

    /// Steps whose parsed input can be shared through a [`ParseCache`](crate::pipeline::ParseCache)
    pub fn is_cacheable(&self) -> bool {
        matches!(
            self,
            StepKind::JsonPath | StepKind::MetricPattern | StepKind::SnmpWalkValue
        )
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What to do when a step fails
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "action", content = "params", rename_all = "kebab-case")]
pub enum OnFailure {
    /// Keep the step's error and stop
    #[default]
    Default,
    /// Drop the value and stop
    Discard,
    /// Replace the value with a literal and continue
    SetValue(String),
    /// Replace the error message and stop
    SetError(String),
}

impl OnFailure {
    pub fn action(&self) -> FailureAction {
        match self {
            OnFailure::Default => FailureAction::Default,
            OnFailure::Discard => FailureAction::Discard,
            OnFailure::SetValue(_) => FailureAction::SetValue,
            OnFailure::SetError(_) => FailureAction::SetError,
        }
    }
}

/// The on-failure action that was applied, without its parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureAction {
    #[default]
    Default,
    Discard,
    SetValue,
    SetError,
}

impl fmt::Display for FailureAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureAction::Default => "default",
            FailureAction::Discard => "discard",
            FailureAction::SetValue => "set-value",
            FailureAction::SetError => "set-error",
        };
        f.write_str(name)
    }
}

/// One configured transformation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    pub kind: StepKind,

    /// Parameter string, often several lines separated by `\n`
    #[serde(default)]
    pub params: String,

    #[serde(default)]
    pub on_failure: OnFailure,
}

impl StepSpec {
    pub fn new(kind: StepKind, params: impl Into<String>) -> Self {
        Self {
            kind,
            params: params.into(),
            on_failure: OnFailure::Default,
        }
    }

    pub fn with_on_failure(mut self, on_failure: OnFailure) -> Self {
        self.on_failure = on_failure;
        self
    }

    /// Check the parameter grammar of this step without running it
    pub fn validate(&self) -> Result<(), String> {
        let params = self.params.as_str();
        match self.kind {
            StepKind::Scale => steps::numeric::parse_multiplier(params).map(|_| ()),
            StepKind::RegexSubstitute => steps::text::RegsubParams::parse(params).map(|_| ()),
            StepKind::ErrorFromRegex => steps::text::RegsubParams::parse(params).map(|_| ()),
            StepKind::ValidateRange => steps::validate::RangeParams::parse(params).map(|_| ()),
            StepKind::ValidateRegex | StepKind::ValidateNotRegex => steps::validate::compile_pattern(params)
                .map(|_| ())
                .map_err(|e| format!("invalid regular expression pattern: {}", e)),
            StepKind::CheckNotSupported => steps::validate::ErrorMatch::parse(params).map(|_| ()),
            StepKind::ThrottleTimed => steps::throttle::parse_time_suffix(params)
                .map(|_| ())
                .ok_or_else(|| format!("invalid time period: {}", params)),
            StepKind::MetricPattern => steps::structured::MetricPatternParams::parse(params).map(|_| ()),
            StepKind::CsvToJson => steps::csv::CsvOptions::parse(params).map(|_| ()),
            StepKind::StringReplace => steps::text::ReplaceParams::parse(params).map(|_| ()),
            StepKind::SnmpWalkValue => steps::snmp::WalkValueParams::parse(params).map(|_| ()),
            StepKind::SnmpWalkToJson => steps::snmp::parse_walk_columns(params).map(|_| ()),
            StepKind::SnmpGetValue => steps::snmp::SnmpFormat::parse(params).map(|_| ()),
            StepKind::Script if params.trim().is_empty() => Err("script is empty".to_string()),
            StepKind::JsonPath | StepKind::Xpath | StepKind::ErrorFromJson | StepKind::ErrorFromXml
                if params.is_empty() =>
            {
                Err("query is empty".to_string())
            }
            _ => Ok(()),
        }
    }
}
