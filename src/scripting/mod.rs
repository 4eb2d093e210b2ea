//! Rhai Scripting Engine for Script Steps
//!
//! A script step runs user code over the current value. The value is
//! available to the script as the string variable `value`; the result of the
//! last expression becomes the new value.
//!
//! - A string or number result replaces the value
//! - A `()` result leaves no value and halts the pipeline
//! - `throw "message"` fails the step with that message
//!
//! Compiled scripts are kept per item and per step index in
//! [`CompiledScripts`], separate from the step history, and are recompiled
//! only when the step's source changes.
//!
//! ## Example Scripts
//!
//! Converting Fahrenheit to Celsius:
//! ```rhai
//! (parse_number(value) - 32.0) * 5.0 / 9.0
//! ```
//!
//! Failing on a sentinel:
//! ```rhai
//! if value == "N/A" { throw "sensor unavailable" }
//! value
//! ```

mod engine;

pub use engine::{ScriptEngine, ScriptError};

use rhai::AST;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// A compiled step script
#[derive(Clone)]
pub struct CompiledScript {
    /// The compiled AST
    ast: AST,
    /// The original source code
    source: String,
}

impl CompiledScript {
    pub fn ast(&self) -> &AST {
        &self.ast
    }

    /// Get the source code of this script
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl std::fmt::Debug for CompiledScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledScript")
            .field("source", &self.source)
            .finish()
    }
}

/// Compiled scripts of one item, keyed by step index
#[derive(Debug, Default, Clone)]
pub struct CompiledScripts {
    scripts: HashMap<usize, CompiledScript>,
}

impl CompiledScripts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the compiled script of step `index`, compiling it if absent or stale
    pub fn get_or_compile(
        &mut self,
        engine: &ScriptEngine,
        index: usize,
        source: &str,
    ) -> Result<&CompiledScript, ScriptError> {
        match self.scripts.entry(index) {
            Entry::Occupied(entry) if entry.get().source == source => Ok(entry.into_mut()),
            entry => {
                let script = CompiledScript {
                    ast: engine.compile(source)?,
                    source: source.to_string(),
                };
                Ok(match entry {
                    Entry::Occupied(mut entry) => {
                        entry.insert(script);
                        entry.into_mut()
                    }
                    Entry::Vacant(entry) => entry.insert(script),
                })
            }
        }
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}
