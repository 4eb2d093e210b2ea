//! Built-in parser for `snmpwalk` output.
//!
//! Each record looks like `OID = TYPE: value`. Quoted values may span lines;
//! wrapped `Hex-STRING` values continue on lines without an `=` separator.

use crate::query::SnmpWalk;
use std::collections::HashMap;

/// One walked object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnmpEntry {
    /// Numeric OID with a leading dot
    pub oid: String,
    /// Value type as printed (`STRING`, `INTEGER`, `Hex-STRING`, ...), empty if absent
    pub kind: String,
    /// Value text with quotes removed
    pub value: String,
}

/// Parsed walk output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnmpTable {
    entries: Vec<SnmpEntry>,
    index: HashMap<String, usize>,
}

impl SnmpTable {
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut entries: Vec<SnmpEntry> = Vec::new();
        let mut lines = text.lines().enumerate();

        while let Some((row, line)) = lines.next() {
            if line.trim().is_empty() {
                continue;
            }

            let Some((oid, rest)) = split_record(line) else {
                match entries.last_mut() {
                    Some(last) if last.kind == "Hex-STRING" => {
                        last.value.push(' ');
                        last.value.push_str(line.trim());
                        continue;
                    }
                    _ => return Err(format!("cannot parse line {}: \"{}\"", row + 1, line)),
                }
            };

            let (kind, raw) = split_type(rest);
            let value = if let Some(quoted) = raw.strip_prefix('"') {
                let mut buffer = quoted.to_string();
                loop {
                    if let Some(value) = unquote(&buffer) {
                        break value;
                    }
                    match lines.next() {
                        Some((_, next)) => {
                            buffer.push('\n');
                            buffer.push_str(next);
                        }
                        None => return Err(format!("unterminated quoted value of OID \"{}\"", oid)),
                    }
                }
            } else {
                raw.trim().to_string()
            };

            entries.push(SnmpEntry {
                oid: normalize_oid(oid),
                kind: kind.to_string(),
                value,
            });
        }

        let index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.oid.clone(), i))
            .collect();
        Ok(Self { entries, index })
    }

    pub fn entries(&self) -> &[SnmpEntry] {
        &self.entries
    }

    pub fn lookup(&self, oid: &str) -> Option<&SnmpEntry> {
        self.index.get(&normalize_oid(oid)).map(|&i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Add the leading dot net-snmp prints for numeric OIDs
pub fn normalize_oid(oid: &str) -> String {
    let oid = oid.trim();
    if oid.starts_with('.') || !oid.starts_with(|c: char| c.is_ascii_digit()) {
        oid.to_string()
    } else {
        format!(".{}", oid)
    }
}

fn split_record(line: &str) -> Option<(&str, &str)> {
    let (oid, rest) = line.split_once(" = ")?;
    let oid = oid.trim();
    if oid.is_empty() || oid.contains(char::is_whitespace) {
        return None;
    }
    Some((oid, rest))
}

/// Split `TYPE: value`; values without a type (`""`) keep an empty type
pub fn split_type(rest: &str) -> (&str, &str) {
    let rest = rest.trim_start();
    if rest.starts_with('"') {
        return ("", rest);
    }
    match rest.split_once(':') {
        Some((kind, value)) if !kind.is_empty() && !kind.contains(char::is_whitespace) => {
            (kind, value.strip_prefix(' ').unwrap_or(value))
        }
        _ => ("", rest),
    }
}

/// Decode a quoted body up to its closing quote; `None` if it is not closed yet
fn unquote(body: &str) -> Option<String> {
    let mut out = String::new();
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => return Some(out),
            '\\' => match chars.next() {
                Some(escaped) => out.push(escaped),
                None => return None,
            },
            other => out.push(other),
        }
    }
    None
}

/// `snmpwalk` output parser
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinSnmp;

impl SnmpWalk for BuiltinSnmp {
    fn parse(&self, text: &str) -> Result<SnmpTable, String> {
        SnmpTable::parse(text)
    }
}
