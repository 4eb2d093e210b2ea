//! Item value preprocessing pipeline.
//!
//! A raw value enters with a collection timestamp and passes through the
//! item's ordered steps. Each step either transforms the value or fails; a
//! failure is handled by the step's on-failure policy.
//!
//! # Architecture
//!
//! ```text
//! raw value ──► [step 1] ──► [step 2] ──► ... ──► final value
//!                  │            │
//!            ParseCache    StepHistory
//! ```
//!
//! # Design
//!
//! - **Enum dispatch** - `StepKind` is matched exhaustively by the executor.
//! - **Per-item state** - step history and compiled scripts live on the
//!   `ItemPipeline`, never in shared globals.
//! - **Shared parse cache** - items reading the same raw value share one
//!   parsed document through a reference-counted `ParseCache`.
//! - **Per-worker context** - the script engine and query engines live in an
//!   `ExecutionContext` that one worker owns.

pub mod cache;
pub mod context;
pub mod executor;
pub mod history;
pub mod orchestrator;
pub mod step;
pub mod steps;

pub use cache::{Artifact, CacheState, ParseCache};
pub use context::ExecutionContext;
pub use executor::{StepExecutor, StepOutcome};
pub use history::{HistoryEntry, HistorySlot, StepHistory};
pub use orchestrator::{format_error, ItemPipeline, PipelineOrchestrator, PipelineOutput, StepResult};
pub use step::{FailureAction, OnFailure, StepKind, StepSpec};
