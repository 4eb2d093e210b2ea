//! Numeric steps: multiplier, base conversions and deltas.

use crate::pipeline::history::HistorySlot;
use crate::pipeline::step::StepKind;
use crate::types::{parse_double, parse_unsigned, ItemValueType, Timestamp, Value, ValueKind};

const TRUE_WORDS: &[&str] = &[
    "true", "t", "yes", "y", "on", "up", "running", "enabled", "available", "ok", "master",
];
const FALSE_WORDS: &[&str] = &[
    "false", "f", "no", "n", "off", "down", "unused", "disabled", "unavailable", "err", "slave",
];

/// Parse the multiplier parameter of a scale step
pub fn parse_multiplier(params: &str) -> Result<f64, String> {
    parse_double(params.trim())
        .ok_or_else(|| "a numerical value is expected or the value is out of range".to_string())
}

/// Multiply the value by the parameter.
///
/// Unsigned values stay unsigned: an integer multiplier multiplies exactly
/// (wrapping), a fractional one goes through a double and truncates.
pub fn scale(value: &mut Value, value_type: ItemValueType, params: &str) -> Result<(), String> {
    let multiplier = parse_multiplier(params)?;

    let num = value.to_numeric(value_type).map_err(|e| {
        format!(
            "cannot apply multiplier \"{}\" to value of type \"{}\": {}",
            params,
            value.type_desc(),
            e
        )
    })?;

    *value = match num {
        Value::Double(d) => Value::Double(d * multiplier),
        Value::UnsignedInt(u) => match parse_unsigned(params) {
            Some(m) => Value::UnsignedInt(u.wrapping_mul(m)),
            None => Value::UnsignedInt((u as f64 * multiplier) as u64),
        },
        other => other,
    };
    Ok(())
}

fn base_desc(kind: StepKind) -> &'static str {
    match kind {
        StepKind::BoolToDecimal => "boolean",
        StepKind::OctToDecimal => "octal",
        _ => "hexadecimal",
    }
}

fn parse_boolean(s: &str) -> Option<u64> {
    if let Some(d) = parse_double(s) {
        return Some(u64::from(d != 0.0));
    }
    let lower = s.to_ascii_lowercase();
    if TRUE_WORDS.contains(&lower.as_str()) {
        Some(1)
    } else if FALSE_WORDS.contains(&lower.as_str()) {
        Some(0)
    } else {
        None
    }
}

fn parse_octal(s: &str) -> Option<u64> {
    let digits = s.trim_matches(' ');
    if digits.is_empty() || !digits.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
        return None;
    }
    u64::from_str_radix(digits, 8).ok()
}

fn parse_hex(s: &str) -> Option<u64> {
    let trimmed = s.trim_matches(' ');
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return u64::from_str_radix(digits, 16).ok();
    }

    // byte pairs separated by spaces or newlines: "1F 2A"
    let pairs: Vec<&str> = trimmed.split([' ', '\n']).filter(|p| !p.is_empty()).collect();
    if pairs.is_empty()
        || !pairs
            .iter()
            .all(|p| p.len() == 2 && p.bytes().all(|b| b.is_ascii_hexdigit()))
    {
        return None;
    }
    u64::from_str_radix(&pairs.concat(), 16).ok()
}

/// Convert a boolean word, an octal or a hexadecimal string to an unsigned value
pub fn to_decimal(value: &mut Value, kind: StepKind) -> Result<(), String> {
    let text = value.clone().into_string()?;
    let text = text
        .trim_start_matches([' ', '"'])
        .trim_end_matches([' ', '"', '\n', '\r']);

    let parsed = match kind {
        StepKind::BoolToDecimal => parse_boolean(text),
        StepKind::OctToDecimal => parse_octal(text),
        _ => parse_hex(text),
    };

    match parsed {
        Some(u) => {
            *value = Value::UnsignedInt(u);
            Ok(())
        }
        None => Err(format!(
            "cannot convert value \"{}\" from {} to decimal format: invalid value format",
            text,
            base_desc(kind)
        )),
    }
}

fn delta_desc(speed: bool) -> &'static str {
    if speed {
        "speed per second"
    } else {
        "simple change"
    }
}

/// Difference (or rate) between the current value and the one recorded last time.
///
/// Produces no value when there is nothing to compare with, when the counter
/// went backwards, or (for speed) when time did not move forward. The
/// current value and timestamp are recorded in every case.
pub fn delta(
    value: &mut Value,
    value_type: ItemValueType,
    timestamp: Timestamp,
    speed: bool,
    history: &mut HistorySlot,
) -> Result<(), String> {
    let current = value.to_numeric(value_type).map_err(|e| {
        format!(
            "cannot calculate delta ({}) for value of type \"{}\": {}",
            delta_desc(speed),
            value.type_desc(),
            e
        )
    })?;

    *value = if history.value_in.is_none() {
        Value::None
    } else {
        compute_delta(&current, &history.value_in, timestamp, history.timestamp, speed).unwrap_or_default()
    };

    history.timestamp = timestamp;
    history.value_out = current;
    Ok(())
}

fn compute_delta(
    current: &Value,
    previous: &Value,
    timestamp: Timestamp,
    previous_ts: Timestamp,
    speed: bool,
) -> Option<Value> {
    if previous_ts.is_zero() || (speed && previous_ts >= timestamp) {
        return None;
    }
    let elapsed = timestamp.seconds_since(&previous_ts);

    let as_double = matches!(current, Value::Double(_)) || matches!(previous, Value::Double(_));
    if as_double {
        let (Value::Double(cur), Value::Double(prev)) = (
            current.clone().convert(ValueKind::Double).ok()?,
            previous.clone().convert(ValueKind::Double).ok()?,
        ) else {
            return None;
        };
        if prev > cur {
            return None;
        }
        let diff = cur - prev;
        Some(Value::Double(if speed { diff / elapsed } else { diff }))
    } else {
        let (Value::UnsignedInt(cur), Value::UnsignedInt(prev)) = (
            current.clone().convert(ValueKind::UnsignedInt).ok()?,
            previous.clone().convert(ValueKind::UnsignedInt).ok()?,
        ) else {
            return None;
        };
        if prev > cur {
            return None;
        }
        let diff = cur - prev;
        Some(Value::UnsignedInt(if speed {
            (diff as f64 / elapsed) as u64
        } else {
            diff
        }))
    }
}
