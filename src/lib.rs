//! # Preproc-RS: Item Value Preprocessing Engine
//!
//! Transforms raw values collected by a monitoring agent into the final
//! values stored for an item. Each item declares a value type and an ordered
//! list of preprocessing steps (scaling, trimming, regex substitution, JSON
//! path extraction, throttling, scripts and more).
//!
//! ## Architecture
//!
//! - **Types**: The tagged [`Value`] model and item value types
//! - **Pipeline**: Step specifications, the step executor and the orchestrator
//! - **Query**: JSON path, metric text and SNMP walk engines behind traits
//! - **Scripting**: Rhai-based script steps
//! - **Config**: TOML pipeline definitions and engine settings
//!
//! ## Example
//!
//! ```
//! use preproc_rs::{
//!     config::EngineConfig,
//!     pipeline::{ExecutionContext, ItemPipeline, StepKind, StepSpec},
//!     types::{ItemValueType, Timestamp, Value},
//! };
//!
//! let mut ctx = ExecutionContext::new(EngineConfig::default());
//! let mut pipeline = ItemPipeline::new(
//!     1,
//!     ItemValueType::Float,
//!     vec![
//!         StepSpec::new(StepKind::Trim, " "),
//!         StepSpec::new(StepKind::Scale, "2"),
//!     ],
//! );
//!
//! let output = ctx.run(&mut pipeline, None, &Value::string(" 21 "), Timestamp::now());
//! assert_eq!(output.value, Value::Double(42.0));
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod query;
pub mod scripting;
pub mod types;

// Re-export commonly used types
pub use config::{EngineConfig, ItemConfig, PipelineFile};
pub use error::{PreprocError, Result};
pub use pipeline::{ExecutionContext, ItemPipeline, ParseCache, PipelineOutput, StepKind, StepSpec};
pub use scripting::ScriptEngine;
pub use types::{ItemValueType, Timestamp, Value};
