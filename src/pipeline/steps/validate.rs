//! Validation steps and the steps turning a value into an error.

use crate::pipeline::steps::text::{substitute, RegsubParams};
use crate::query::{JsonQuery, XmlQuery};
use crate::types::{parse_double, ItemValueType, Value, ValueKind};
use regex::Regex;

/// `min\nmax` bounds of a range validation; either side may be empty
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeParams<'a> {
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Bound texts as configured, quoted back in error messages
    pub min_text: &'a str,
    pub max_text: &'a str,
}

impl<'a> RangeParams<'a> {
    pub fn parse(params: &'a str) -> Result<Self, String> {
        let (min_text, max_text) = params
            .split_once('\n')
            .ok_or_else(|| "validation range is not specified".to_string())?;

        let bound = |text: &str, which: &str| -> Result<Option<f64>, String> {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            parse_double(text)
                .map(Some)
                .ok_or_else(|| format!("validation range {} value is invalid: {}", which, text))
        };

        Ok(Self {
            min: bound(min_text, "minimum")?,
            max: bound(max_text, "maximum")?,
            min_text,
            max_text,
        })
    }
}

/// Fail unless the numeric value lies within the configured bounds.
///
/// The value itself is never changed.
pub fn validate_range(value: &Value, value_type: ItemValueType, params: &str) -> Result<(), String> {
    let num = value.to_numeric(value_type)?;
    let range = RangeParams::parse(params)?;

    let d = match num.convert(ValueKind::Double) {
        Ok(Value::Double(d)) => d,
        _ => return Err("cannot convert value to numeric type".to_string()),
    };

    let below = range.min.is_some_and(|min| d < min);
    let above = range.max.is_some_and(|max| d > max);
    if below || above {
        let mut parts = Vec::new();
        if range.min.is_some() {
            parts.push(format!("less than {}", range.min_text));
        }
        if range.max.is_some() {
            parts.push(format!("greater than {}", range.max_text));
        }
        return Err(format!("value is {}", parts.join(" or ")));
    }
    Ok(())
}

/// Compile a validation pattern
pub fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(pattern)
}

/// Fail if the value does not match (or, with `negate`, matches) the pattern
pub fn validate_regex(value: &mut Value, params: &str, negate: bool) -> Result<(), String> {
    let wrap = |value: &Value, e: &str| {
        format!(
            "cannot perform regular expression \"{}\" validation for value of type \"{}\": {}",
            params,
            value.type_desc(),
            e
        )
    };

    let text = value
        .clone()
        .into_string()
        .map_err(|_| wrap(value, "cannot convert value to string"))?;
    let regex = compile_pattern(params)
        .map_err(|e| wrap(value, &format!("invalid regular expression pattern: {}", e)))?;

    match (regex.is_match(&text), negate) {
        (true, false) | (false, true) => Ok(()),
        (false, false) => Err(wrap(value, "value does not match regular expression")),
        (true, true) => Err(wrap(value, "value matches regular expression")),
    }
}

/// Which errors a check-not-supported step reacts to
#[derive(Debug, Clone)]
pub enum ErrorMatch {
    /// Every error
    Any,
    /// Errors whose message matches
    Matches(Regex),
    /// Errors whose message does not match
    NotMatches(Regex),
    /// No error; a does-not-match rule whose pattern does not compile
    Never,
}

impl ErrorMatch {
    /// Parse `match_type\npattern`; a missing second line means any error
    pub fn parse(params: &str) -> Result<Self, String> {
        let Some((kind, pattern)) = params.split_once('\n') else {
            return Ok(ErrorMatch::Any);
        };

        match kind.trim().parse::<i32>().unwrap_or(0) {
            -1 => Ok(ErrorMatch::Any),
            0 => Regex::new(pattern)
                .map(ErrorMatch::Matches)
                .map_err(|e| format!("invalid regular expression: {}", e)),
            _ => Ok(Regex::new(pattern).map_or(ErrorMatch::Never, ErrorMatch::NotMatches)),
        }
    }

    pub fn hits(&self, message: &str) -> bool {
        match self {
            ErrorMatch::Any => true,
            ErrorMatch::Matches(regex) => regex.is_match(message),
            ErrorMatch::NotMatches(regex) => !regex.is_match(message),
            ErrorMatch::Never => false,
        }
    }
}

/// React to an error value left by the previous step.
///
/// A matching error makes this step fail with the same message so that its
/// on-failure action applies. Anything else passes through untouched.
pub fn check_not_supported(value: &mut Value, params: &str) -> Result<(), String> {
    let Value::Error(message) = value else {
        return Ok(());
    };
    let rule = ErrorMatch::parse(params)?;
    if rule.hits(message) {
        return Err(message.clone());
    }
    Ok(())
}

/// Turn a non-empty trimmed text into an error
fn raise(found: Option<String>) -> Result<(), String> {
    match found.as_deref().map(str::trim) {
        Some(message) if !message.is_empty() => Err(message.to_string()),
        _ => Ok(()),
    }
}

/// Fail with the text found at `params` in a JSON document.
///
/// Values that are not JSON pass through.
pub fn error_from_json(value: &mut Value, params: &str, json: &dyn JsonQuery) -> Result<(), String> {
    let Ok(text) = value.clone().into_string() else {
        return Ok(());
    };
    let Ok(doc) = json.open(&text) else {
        return Ok(());
    };
    raise(json.query(&doc, params)?)
}

/// Fail with the text found by the XPath expression in an XML document
pub fn error_from_xml(
    value: &mut Value,
    params: &str,
    xml: Result<&dyn XmlQuery, String>,
) -> Result<(), String> {
    let xml = xml?;
    let Ok(text) = value.clone().into_string() else {
        return Ok(());
    };
    raise(xml.query_xpath(&text, params)?)
}

/// Fail with the output template when the pattern matches
pub fn error_from_regex(value: &mut Value, params: &str) -> Result<(), String> {
    let parsed = RegsubParams::parse(params)?;
    let text = value.clone().into_string()?;
    let regex = Regex::new(parsed.pattern)
        .map_err(|_| format!("invalid regular expression \"{}\"", parsed.pattern))?;

    match regex.captures(&text) {
        Some(caps) => raise(Some(substitute(parsed.output, &caps))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::BuiltinJsonPath;

    #[test]
    fn test_range_params() {
        let range = RangeParams::parse("1\n").unwrap();
        assert_eq!(range.min, Some(1.0));
        assert_eq!(range.max, None);
        assert_eq!(range.min_text, "1");

        assert_eq!(
            RangeParams::parse("10").unwrap_err(),
            "validation range is not specified"
        );
        assert_eq!(
            RangeParams::parse("a\n5").unwrap_err(),
            "validation range minimum value is invalid: a"
        );
        assert_eq!(
            RangeParams::parse("\nb").unwrap_err(),
            "validation range maximum value is invalid: b"
        );
    }

    #[test]
    fn test_validate_range() {
        let err = validate_range(&Value::string("15"), ItemValueType::Float, "1\n10").unwrap_err();
        assert_eq!(err, "value is less than 1 or greater than 10");

        let err = validate_range(&Value::string("-1"), ItemValueType::String, "0\n").unwrap_err();
        assert_eq!(err, "value is less than 0");

        let err = validate_range(&Value::string("x"), ItemValueType::Float, "0\n1").unwrap_err();
        assert_eq!(err, "cannot convert value to numeric type");
    }

    #[test]
    fn test_validate_range_quotes_bounds_as_written() {
        let err = validate_range(&Value::string("2000"), ItemValueType::Float, "1.50\n1e3").unwrap_err();
        assert_eq!(err, "value is less than 1.50 or greater than 1e3");
    }

    #[test]
    fn test_validate_range_keeps_value() {
        let value = Value::string("05");
        validate_range(&value, ItemValueType::String, "0\n100").unwrap();
        assert_eq!(value, Value::string("05"));

        let value = Value::string(" 7.50 ");
        validate_range(&value, ItemValueType::Float, "0\n100").unwrap();
        assert_eq!(value, Value::string(" 7.50 "));
    }

    #[test]
    fn test_validate_regex() {
        let mut value = Value::string("OK: all good");
        validate_regex(&mut value, "^OK", false).unwrap();
        assert_eq!(value, Value::string("OK: all good"));

        let err = validate_regex(&mut value, "^OK", true).unwrap_err();
        assert_eq!(
            err,
            "cannot perform regular expression \"^OK\" validation for value of type \"str\": value matches regular expression"
        );

        let err = validate_regex(&mut value, "^FAIL", false).unwrap_err();
        assert!(err.ends_with("value does not match regular expression"));

        let err = validate_regex(&mut value, "[", false).unwrap_err();
        assert!(err.contains("invalid regular expression pattern"));
    }

    #[test]
    fn test_check_not_supported() {
        let mut value = Value::error("timeout while connecting");
        assert_eq!(
            check_not_supported(&mut value, "").unwrap_err(),
            "timeout while connecting"
        );
        assert!(check_not_supported(&mut value, "0\n^timeout").is_err());
        assert!(check_not_supported(&mut value, "0\n^refused").is_ok());
        assert!(check_not_supported(&mut value, "1\n^refused").is_err());
        assert!(check_not_supported(&mut value, "-1\nanything").is_err());

        // a broken pattern fails a matches rule but never hits a does-not-match rule
        assert!(check_not_supported(&mut value, "0\n(").unwrap_err().starts_with("invalid regular expression"));
        assert!(check_not_supported(&mut value, "1\n(").is_ok());
        assert_eq!(value, Value::error("timeout while connecting"));

        let mut value = Value::string("fine");
        assert!(check_not_supported(&mut value, "").is_ok());
        assert_eq!(value, Value::string("fine"));
    }

    #[test]
    fn test_error_from_json() {
        let json = BuiltinJsonPath;
        let mut value = Value::string(r#"{"error":" disk full "}"#);
        assert_eq!(error_from_json(&mut value, "$.error", &json).unwrap_err(), "disk full");

        let mut value = Value::string(r#"{"status":"ok"}"#);
        assert!(error_from_json(&mut value, "$.error", &json).is_ok());

        let mut value = Value::string("not json");
        assert!(error_from_json(&mut value, "$.error", &json).is_ok());
    }

    #[test]
    fn test_error_from_xml_without_engine() {
        let mut value = Value::string("<a/>");
        let err = error_from_xml(&mut value, "/a", Err(crate::query::XML_UNAVAILABLE.to_string())).unwrap_err();
        assert_eq!(err, crate::query::XML_UNAVAILABLE);
    }

    #[test]
    fn test_error_from_regex() {
        let mut value = Value::string("ERROR: quota exceeded");
        let err = error_from_regex(&mut value, "^ERROR: (.*)$\n\\1").unwrap_err();
        assert_eq!(err, "quota exceeded");

        let mut value = Value::string("all fine");
        assert!(error_from_regex(&mut value, "^ERROR: (.*)$\n\\1").is_ok());

        assert_eq!(
            error_from_regex(&mut value, "(\n\\1").unwrap_err(),
            "invalid regular expression \"(\""
        );
        assert_eq!(
            error_from_regex(&mut value, "x").unwrap_err(),
            "cannot find second parameter"
        );
    }
}
