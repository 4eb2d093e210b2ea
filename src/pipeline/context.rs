//! Per-worker execution context.
//!
//! A context belongs to one worker and is never shared between concurrent
//! runs. It carries the engine settings, the query collaborators and the
//! lazily created script engine.

use crate::config::EngineConfig;
use crate::query::Collaborators;
use crate::scripting::ScriptEngine;
use tracing::warn;

#[derive(Debug, Default)]
pub struct ExecutionContext {
    config: EngineConfig,
    collaborators: Collaborators,
    script_engine: Option<ScriptEngine>,
}

impl ExecutionContext {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            collaborators: Collaborators::default(),
            script_engine: None,
        }
    }

    /// Replace the query engines
    pub fn with_collaborators(mut self, collaborators: Collaborators) -> Self {
        self.collaborators = collaborators;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// The script engine, created on first use
    pub fn script_engine(&mut self) -> &ScriptEngine {
        let limits = &self.config.script;
        self.script_engine.get_or_insert_with(|| ScriptEngine::new(limits))
    }

    pub fn has_script_engine(&self) -> bool {
        self.script_engine.is_some()
    }

    /// Drop the script engine after a fatal error
    pub fn teardown_script_engine(&mut self, reason: &str) {
        if self.script_engine.take().is_some() {
            warn!(reason, "script engine destroyed after fatal error");
        }
    }
}
