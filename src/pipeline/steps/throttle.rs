//! Steps suppressing repeated values.

use crate::pipeline::history::HistorySlot;
use crate::types::{Timestamp, Value};
use std::cmp::Ordering;

/// Parse a period like `30`, `90s`, `5m`, `2h`, `1d` or `1w` into seconds
pub fn parse_time_suffix(params: &str) -> Option<i64> {
    let text = params.trim();
    let (digits, multiplier) = match text.chars().last()? {
        's' => (&text[..text.len() - 1], 1),
        'm' => (&text[..text.len() - 1], 60),
        'h' => (&text[..text.len() - 1], 3600),
        'd' => (&text[..text.len() - 1], 86_400),
        'w' => (&text[..text.len() - 1], 7 * 86_400),
        _ => (text, 1),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<i64>().ok()?.checked_mul(multiplier)
}

/// Drop the value when it equals the previous one
pub fn throttle(value: &mut Value, timestamp: Timestamp, history: &mut HistorySlot) -> Result<(), String> {
    let unchanged = value.compare(&history.value_in) == Ordering::Equal;
    history.value_out = value.clone();

    if unchanged {
        *value = Value::None;
    } else {
        history.timestamp = timestamp;
    }
    Ok(())
}

/// Drop an unchanged value until `params` seconds have passed since it was last kept
pub fn throttle_timed(
    value: &mut Value,
    timestamp: Timestamp,
    params: &str,
    history: &mut HistorySlot,
) -> Result<(), String> {
    let timeout = parse_time_suffix(params).ok_or_else(|| format!("invalid time period: {}", params))?;

    let unchanged = value.compare(&history.value_in) == Ordering::Equal;
    let period = if history.value_in.is_none() {
        0
    } else {
        timestamp.sec - history.timestamp.sec
    };
    history.value_out = value.clone();

    if unchanged && period < timeout {
        *value = Value::None;
    } else {
        history.timestamp = timestamp;
    }
    Ok(())
}
