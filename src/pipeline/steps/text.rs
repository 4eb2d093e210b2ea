//! Text steps: trimming, regular expression substitution and string replace.

use crate::pipeline::step::StepKind;
use crate::types::Value;
use regex::{Captures, Regex};

/// Expand `\s`, `\r`, `\n` and `\t` in step parameters.
///
/// With `keep_backslash` a doubled backslash collapses into one. Any other
/// backslash is kept as-is.
pub fn unescape(params: &str, keep_backslash: bool) -> String {
    let mut out = String::with_capacity(params.len());
    let mut chars = params.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let replacement = match chars.peek() {
            Some('s') => Some(' '),
            Some('r') => Some('\r'),
            Some('n') => Some('\n'),
            Some('t') => Some('\t'),
            Some('\\') if keep_backslash => Some('\\'),
            _ => None,
        };
        match replacement {
            Some(r) => {
                out.push(r);
                chars.next();
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Make control characters visible for error messages
fn printable(params: &str) -> String {
    params
        .chars()
        .flat_map(|c| match c {
            '\r' => vec!['\\', 'r'],
            '\n' => vec!['\\', 'n'],
            '\t' => vec!['\\', 't'],
            other => vec![other],
        })
        .collect()
}

/// Remove the characters listed in `params` from one or both ends
pub fn trim(value: &mut Value, kind: StepKind, params: &str) -> Result<(), String> {
    let set: Vec<char> = unescape(params, false).chars().collect();

    let text = match value.clone().into_string() {
        Ok(text) => text,
        Err(e) => {
            let side = match kind {
                StepKind::TrimLeft => "left ",
                StepKind::TrimRight => "right ",
                _ => "",
            };
            return Err(format!(
                "cannot perform {}trim of \"{}\" for value of type \"{}\": {}",
                side,
                printable(params),
                value.type_desc(),
                e
            ));
        }
    };

    let trimmed = match kind {
        StepKind::TrimLeft => text.trim_start_matches(set.as_slice()),
        StepKind::TrimRight => text.trim_end_matches(set.as_slice()),
        _ => text.trim_matches(set.as_slice()),
    };
    *value = Value::string(trimmed);
    Ok(())
}

/// `pattern\noutput` parameters shared by regular expression substitution steps
#[derive(Debug, Clone)]
pub struct RegsubParams<'a> {
    pub pattern: &'a str,
    pub output: &'a str,
}

impl<'a> RegsubParams<'a> {
    pub fn parse(params: &'a str) -> Result<Self, String> {
        let (pattern, output) = params
            .split_once('\n')
            .ok_or_else(|| "cannot find second parameter".to_string())?;
        Ok(Self { pattern, output })
    }
}

/// Fill `\0`..`\9` references in `template` from `caps`; unmatched groups are empty
pub fn substitute(template: &str, caps: &Captures<'_>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(group) = chars.peek().and_then(|d| d.to_digit(10)) {
                chars.next();
                if let Some(m) = caps.get(group as usize) {
                    out.push_str(m.as_str());
                }
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Replace the value with the output template filled from the first match
pub fn regex_substitute(value: &mut Value, params: &str) -> Result<(), String> {
    let first_line = params.split('\n').next().unwrap_or_default();
    let wrap = |value: &Value, e: &str| {
        format!(
            "cannot perform regular expression \"{}\" match for value of type \"{}\": {}",
            first_line,
            value.type_desc(),
            e
        )
    };

    let text = value.clone().into_string().map_err(|e| wrap(value, &e))?;
    let parsed = RegsubParams::parse(params).map_err(|e| wrap(value, &e))?;
    let regex = Regex::new(parsed.pattern)
        .map_err(|e| wrap(value, &format!("invalid regular expression: {}", e)))?;

    match regex.captures(&text) {
        Some(caps) => {
            *value = Value::string(substitute(parsed.output, &caps));
            Ok(())
        }
        None => Err(wrap(value, "pattern does not match")),
    }
}

/// `search\nreplace` parameters of the string replace step
#[derive(Debug, Clone)]
pub struct ReplaceParams {
    pub search: String,
    pub replace: String,
}

impl ReplaceParams {
    pub fn parse(params: &str) -> Result<Self, String> {
        let (search, replace) = params
            .split_once('\n')
            .ok_or_else(|| "cannot find second parameter".to_string())?;
        if search.is_empty() {
            return Err("first parameter is expected".to_string());
        }
        Ok(Self {
            search: unescape(search, true),
            replace: unescape(replace, true),
        })
    }
}

/// Replace every occurrence of the search string
pub fn string_replace(value: &mut Value, params: &str) -> Result<(), String> {
    let parsed = ReplaceParams::parse(params)?;
    let text = value.clone().into_string()?;
    *value = Value::string(text.replace(&parsed.search, &parsed.replace));
    Ok(())
}
