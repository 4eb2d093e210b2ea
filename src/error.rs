//! Error handling for the preprocessing engine
//!
//! Step failures never surface as Rust errors: they become `Value::Error`
//! inside the pipeline. The types here cover the host-facing side instead
//! (configuration loading, invalid step definitions, script engine setup).

use thiserror::Error;

/// Main error type for preprocessing operations
#[derive(Error, Debug)]
pub enum PreprocError {
    /// Errors related to Rhai script compilation or setup
    #[error("Script error: {0}")]
    Script(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// A step definition that cannot be executed
    #[error("Invalid step #{index}: {message}")]
    InvalidStep { index: usize, message: String },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PreprocError>,
    },
}

impl PreprocError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PreprocError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a script error from a Rhai error
    pub fn from_rhai_error(err: Box<rhai::EvalAltResult>) -> Self {
        PreprocError::Script(err.to_string())
    }
}

/// Result type alias for preprocessing operations
pub type Result<T> = std::result::Result<T, PreprocError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, Box<rhai::EvalAltResult>> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PreprocError::from_rhai_error(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| PreprocError::from_rhai_error(e).with_context(f()))
    }
}
