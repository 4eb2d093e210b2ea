//! Rhai Script Engine Implementation
//!
//! The engine runs preprocessing scripts in a sandbox bounded by
//! [`ScriptLimits`]. It is heavyweight, so an [`ExecutionContext`]
//! creates it on first use and keeps it until a fatal error.
//!
//! ## Script Helpers
//!
//! - `parse_number(text)` - Parse a decimal number (NaN if invalid)
//! - `hex_to_int(text)` - Parse a hexadecimal integer (`0x` prefix optional)
//! - `round_to(value, digits)` - Round to a number of decimal digits
//! - `clamp(value, min, max)` - Limit a value to a range
//! - `log_debug(message)` - Write a debug log line
//!
//! [`ExecutionContext`]: crate::pipeline::ExecutionContext

use crate::config::ScriptLimits;
use crate::error::{Result, ResultExt};
use crate::types::parse_double;
use rhai::{Dynamic, Engine, EvalAltResult, Scope, AST};
use thiserror::Error;
use tracing::debug;

/// Failure of a script compile or run
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ScriptError {
    message: String,
    fatal: bool,
}

impl ScriptError {
    /// True if the engine must be discarded after this error
    pub fn is_fatal(&self) -> bool {
        self.fatal
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    fn from_eval(err: Box<EvalAltResult>) -> Self {
        let fatal = matches!(
            *err,
            EvalAltResult::ErrorTooManyOperations(_)
                | EvalAltResult::ErrorStackOverflow(_)
                | EvalAltResult::ErrorDataTooLarge(..)
                | EvalAltResult::ErrorTerminated(..)
        );
        let message = match *err {
            EvalAltResult::ErrorRuntime(ref thrown, _) => thrown.to_string(),
            ref other => other.to_string(),
        };
        Self { message, fatal }
    }
}

/// The script engine used by script steps
pub struct ScriptEngine {
    /// The Rhai engine instance
    engine: Engine,
}

impl ScriptEngine {
    /// Create an engine with the given sandbox limits
    pub fn new(limits: &ScriptLimits) -> Self {
        let mut engine = Engine::new();
        Self::configure_engine(&mut engine, limits);
        debug!(max_operations = limits.max_operations, "script engine initialized");
        Self { engine }
    }

    /// Configure the Rhai engine with helper functions and safety limits
    fn configure_engine(engine: &mut Engine, limits: &ScriptLimits) {
        // Set safety limits
        engine.set_max_expr_depths(limits.max_expr_depth, limits.max_expr_depth);
        engine.set_max_call_levels(limits.max_call_levels);
        engine.set_max_operations(limits.max_operations);
        engine.set_max_string_size(limits.max_string_size);
        engine.set_max_array_size(limits.max_array_size);
        engine.set_max_map_size(limits.max_map_size);

        // ===== Parsing Helpers =====

        engine.register_fn("parse_number", |text: &str| -> f64 {
            parse_double(text).unwrap_or(f64::NAN)
        });

        engine.register_fn(
            "hex_to_int",
            |text: &str| -> std::result::Result<i64, Box<EvalAltResult>> {
                let trimmed = text.trim();
                let digits = trimmed
                    .strip_prefix("0x")
                    .or_else(|| trimmed.strip_prefix("0X"))
                    .unwrap_or(trimmed);
                i64::from_str_radix(digits, 16)
                    .map_err(|_| format!("invalid hexadecimal number \"{}\"", text).into())
            },
        );

        // ===== Numeric Helpers =====

        engine.register_fn("round_to", |x: f64, digits: i64| -> f64 {
            let factor = 10f64.powi(digits.clamp(0, 15) as i32);
            (x * factor).round() / factor
        });

        engine.register_fn("clamp", |x: f64, min: f64, max: f64| x.clamp(min, max));

        engine.register_fn("log_debug", |message: &str| {
            debug!(target: "preproc_rs::script", "{}", message);
        });
    }

    /// Compile a script
    pub fn compile(&self, source: &str) -> std::result::Result<AST, ScriptError> {
        self.engine.compile(source).map_err(|e| ScriptError {
            message: format!("cannot compile script: {}", e),
            fatal: false,
        })
    }

    /// Run a compiled script with `input` bound to `value`.
    ///
    /// Returns `None` when the script produces no value (`()`).
    pub fn execute(&self, ast: &AST, input: &str) -> std::result::Result<Option<String>, ScriptError> {
        let mut scope = Scope::new();
        scope.push("value", input.to_string());

        let result = self
            .engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, ast)
            .map_err(ScriptError::from_eval)?;

        if result.is_unit() {
            return Ok(None);
        }
        Ok(Some(result.to_string()))
    }

    /// Validate a script without executing it
    pub fn validate(&self, source: &str) -> Result<()> {
        self.engine
            .compile(source)
            .map(|_| ())
            .map_err(Box::<EvalAltResult>::from)
            .context("Validation error")
    }
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new(&ScriptLimits::default())
    }
}

impl std::fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptEngine").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str, input: &str) -> std::result::Result<Option<String>, ScriptError> {
        let engine = ScriptEngine::default();
        let ast = engine.compile(source)?;
        engine.execute(&ast, input)
    }

    #[test]
    fn test_value_is_string() {
        assert_eq!(run("value + \"!\"", "hi").unwrap(), Some("hi!".to_string()));
        assert_eq!(run("value.len()", "four").unwrap(), Some("4".to_string()));
    }

    #[test]
    fn test_unit_result_is_no_value() {
        assert_eq!(run("let x = 1;", "").unwrap(), None);
    }

    #[test]
    fn test_thrown_message() {
        let err = run("throw \"bad input\"", "").unwrap_err();
        assert_eq!(err.message(), "bad input");
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_operation_limit_is_fatal() {
        let limits = ScriptLimits {
            max_operations: 1_000,
            ..ScriptLimits::default()
        };
        let engine = ScriptEngine::new(&limits);
        let ast = engine.compile("loop { }").unwrap();
        let err = engine.execute(&ast, "").unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_helpers() {
        assert_eq!(run("parse_number(value) * 2.0", "2.5").unwrap(), Some("5.0".to_string()));
        assert_eq!(run("hex_to_int(value)", "0x1F").unwrap(), Some("31".to_string()));
        assert!(run("hex_to_int(value)", "zz").is_err());
        assert_eq!(run("round_to(2.345, 1)", "").unwrap(), Some("2.3".to_string()));
        assert_eq!(run("clamp(150.0, 0.0, 100.0)", "").unwrap(), Some("100.0".to_string()));
    }

    #[test]
    fn test_validation() {
        let engine = ScriptEngine::default();
        assert!(engine.validate("value + \"x\"").is_ok());
        assert!(engine.validate("value + ").is_err());
    }

    #[test]
    fn test_compile_error_message() {
        let err = ScriptEngine::default().compile("let = ;").unwrap_err();
        assert!(err.message().starts_with("cannot compile script: "));
    }
}
