//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use preproc_rs::types::Value;

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Assert a value is a double approximately equal to `expected`
pub fn assert_double(value: &Value, expected: f64) {
    match value {
        Value::Double(d) => assert_float_eq(*d, expected, 1e-9),
        other => panic!("Expected a double close to {}, got {:?}", expected, other),
    }
}

/// The error message of `value`, panicking if it is not an error
pub fn error_text(value: &Value) -> &str {
    match value {
        Value::Error(message) => message,
        other => panic!("Expected an error value, got {:?}", other),
    }
}
