//! Engine settings shared by every pipeline run
//!
//! These settings do not change per item. They control message formatting
//! limits and the sandbox limits applied to the embedded script engine.
//!
//! # Main Types
//!
//! - [`EngineConfig`] - Preview/log/error length limits and script limits
//! - [`ScriptLimits`] - Safety limits for the Rhai engine

use serde::{Deserialize, Serialize};

/// Default number of characters of the input value shown in composite errors
pub const DEFAULT_VALUE_PREVIEW_LEN: usize = 100;

/// Default number of characters of a value written to debug logs
pub const DEFAULT_LOG_VALUE_LIMIT: usize = 4096;

/// Default maximum length of a composite pipeline error message
pub const DEFAULT_MAX_ERROR_LEN: usize = 2048;

/// Settings for the preprocessing engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Characters of the original value quoted in composite error messages
    pub value_preview_len: usize,

    /// Characters of a value written to debug logs
    pub log_value_limit: usize,

    /// Upper bound on the composite error message length
    pub max_error_len: usize,

    /// Script engine sandbox limits
    pub script: ScriptLimits,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            value_preview_len: DEFAULT_VALUE_PREVIEW_LEN,
            log_value_limit: DEFAULT_LOG_VALUE_LIMIT,
            max_error_len: DEFAULT_MAX_ERROR_LEN,
            script: ScriptLimits::default(),
        }
    }
}

/// Safety limits for the embedded script engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptLimits {
    /// Maximum number of operations a single script run may perform
    pub max_operations: u64,

    /// Maximum function call nesting
    pub max_call_levels: usize,

    /// Maximum expression nesting depth
    pub max_expr_depth: usize,

    /// Maximum string length produced by a script
    pub max_string_size: usize,

    /// Maximum array length
    pub max_array_size: usize,

    /// Maximum object map size
    pub max_map_size: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_operations: 1_000_000,
            max_call_levels: 32,
            max_expr_depth: 64,
            max_string_size: 16 * 1024 * 1024,
            max_array_size: 100_000,
            max_map_size: 100_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.value_preview_len, DEFAULT_VALUE_PREVIEW_LEN);
        assert_eq!(config.log_value_limit, DEFAULT_LOG_VALUE_LIMIT);
        assert_eq!(config.script.max_call_levels, 32);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
value_preview_len = 20

[script]
max_operations = 500
"#,
        )
        .unwrap();

        assert_eq!(config.value_preview_len, 20);
        assert_eq!(config.log_value_limit, DEFAULT_LOG_VALUE_LIMIT);
        assert_eq!(config.script.max_operations, 500);
        assert_eq!(config.script.max_expr_depth, 64);
    }
}
