//! Configuration module for the preprocessing engine
//!
//! This module handles loading of pipeline definitions:
//! - Engine-wide settings ([`EngineConfig`])
//! - Item definitions: value type plus ordered preprocessing steps
//! - Test inputs for the `test` command of the binary
//!
//! # File Format
//!
//! ```toml
//! [engine]
//! value_preview_len = 100
//!
//! [item]
//! item_id = 10
//! value_type = "float"
//!
//! [[item.steps]]
//! kind = "scale"
//! params = "2"
//!
//! [[item.steps]]
//! kind = "delta-speed"
//! on_failure = { action = "set-value", params = "0" }
//!
//! [[inputs]]
//! value = "21"
//! timestamp = 10.0
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{PreprocError, Result, ResultExt};
use crate::pipeline::{ItemPipeline, StepSpec};
use crate::types::{ItemValueType, Timestamp, Value};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Item definition: declared type and preprocessing steps
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemConfig {
    /// Item identifier, used for logging only
    pub item_id: u64,

    /// Declared value type of the item
    pub value_type: ItemValueType,

    /// Ordered preprocessing steps
    pub steps: Vec<StepSpec>,
}

impl ItemConfig {
    /// Build an executable pipeline from this definition
    pub fn into_pipeline(self) -> Result<ItemPipeline> {
        for (index, step) in self.steps.iter().enumerate() {
            step.validate()
                .map_err(|message| PreprocError::InvalidStep { index: index + 1, message })?;
        }
        Ok(ItemPipeline::new(self.item_id, self.value_type, self.steps))
    }
}

/// How an input string is turned into a [`Value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum InputKind {
    #[default]
    String,
    Double,
    Unsigned,
    Error,
}

/// One value fed into the pipeline by the `test` command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputValue {
    /// Raw value text
    pub value: String,

    /// Collection time in fractional seconds (defaults to now)
    #[serde(default)]
    pub timestamp: Option<f64>,

    /// How to interpret `value`
    #[serde(default)]
    pub kind: InputKind,
}

impl InputValue {
    /// The typed value described by this input
    pub fn to_value(&self) -> Result<Value> {
        let value = Value::string(self.value.clone());
        let converted = match self.kind {
            InputKind::String => Ok(value),
            InputKind::Error => Ok(Value::error(self.value.clone())),
            InputKind::Double => value.convert(crate::types::ValueKind::Double),
            InputKind::Unsigned => value.convert(crate::types::ValueKind::UnsignedInt),
        };
        converted.map_err(|e| PreprocError::Config(format!("input \"{}\": {}", self.value, e)))
    }

    /// The collection time of this input
    pub fn timestamp(&self) -> Timestamp {
        match self.timestamp {
            Some(secs) if secs > 0.0 => {
                let sec = secs.trunc() as i64;
                let ns = ((secs - secs.trunc()) * 1_000_000_000.0).round() as u32;
                Timestamp::new(sec, ns.min(999_999_999))
            }
            _ => Timestamp::now(),
        }
    }
}

/// A complete pipeline definition file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineFile {
    pub engine: EngineConfig,
    pub item: ItemConfig,
    pub inputs: Vec<InputValue>,
}

impl PipelineFile {
    /// Parse a pipeline definition from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: PipelineFile = toml::from_str(text)?;
        Ok(file)
    }

    /// Load a pipeline definition from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(PreprocError::from)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Save the definition as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = toml::to_string_pretty(self)
            .map_err(|e| PreprocError::Config(format!("Failed to serialize pipeline: {}", e)))?;
        std::fs::write(path, text)?;
        Ok(())
    }
}
