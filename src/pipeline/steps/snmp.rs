//! SNMP steps: single values and discovery tables from walk output.

use crate::pipeline::cache::{Artifact, ParseCache};
use crate::pipeline::step::StepKind;
use crate::query::snmp::{normalize_oid, split_type};
use crate::query::{SnmpTable, SnmpWalk};
use crate::types::Value;
use serde_json::{Map, Value as Json};
use std::sync::Arc;

/// Output format applied to an SNMP value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnmpFormat {
    #[default]
    Unchanged,
    /// Hex-STRING decoded as UTF-8 text
    Utf8,
    /// Hex-STRING rendered as a MAC address
    Mac,
    /// BITS rendered as an integer
    Bits,
}

impl SnmpFormat {
    pub fn parse(params: &str) -> Result<Self, String> {
        match params.trim() {
            "" | "0" => Ok(SnmpFormat::Unchanged),
            "1" => Ok(SnmpFormat::Utf8),
            "2" => Ok(SnmpFormat::Mac),
            "3" => Ok(SnmpFormat::Bits),
            other => Err(format!("invalid format \"{}\"", other)),
        }
    }

    /// Render `value` of SNMP type `kind`. Values of other types pass unchanged.
    pub fn apply(&self, kind: &str, value: &str) -> Result<String, String> {
        match self {
            SnmpFormat::Utf8 if kind == "Hex-STRING" => {
                let bytes = hex_bytes(value)?;
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
            SnmpFormat::Mac if kind == "Hex-STRING" => {
                let bytes = hex_bytes(value)?;
                Ok(bytes
                    .iter()
                    .map(|b| format!("{:02x}", b))
                    .collect::<Vec<_>>()
                    .join(":"))
            }
            SnmpFormat::Bits if kind == "BITS" => {
                let bytes = leading_hex_bytes(value);
                if bytes.is_empty() {
                    return Err(format!("cannot convert BITS value \"{}\" to integer", value));
                }
                // bit 0 is the most significant bit of the first octet
                let number = bytes
                    .iter()
                    .take(8)
                    .enumerate()
                    .fold(0u64, |acc, (i, b)| acc | (u64::from(b.reverse_bits()) << (8 * i)));
                Ok(number.to_string())
            }
            _ => Ok(value.to_string()),
        }
    }
}

fn hex_bytes(value: &str) -> Result<Vec<u8>, String> {
    value
        .split_whitespace()
        .map(|pair| {
            u8::from_str_radix(pair, 16).map_err(|_| format!("invalid Hex-STRING value \"{}\"", value))
        })
        .collect()
}

/// Hex octets at the start of a BITS value, before its `name(n)` annotations
fn leading_hex_bytes(value: &str) -> Vec<u8> {
    value
        .split_whitespace()
        .map_while(|token| {
            if token.len() == 2 {
                u8::from_str_radix(token, 16).ok()
            } else {
                None
            }
        })
        .collect()
}

/// `oid\nformat` parameters of the walk-to-value step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkValueParams {
    pub oid: String,
    pub format: SnmpFormat,
}

impl WalkValueParams {
    pub fn parse(params: &str) -> Result<Self, String> {
        let (oid, format) = match params.split_once('\n') {
            Some((oid, format)) => (oid, SnmpFormat::parse(format)?),
            None => (params, SnmpFormat::Unchanged),
        };
        if oid.trim().is_empty() {
            return Err("OID is not specified".to_string());
        }
        Ok(Self {
            oid: normalize_oid(oid),
            format,
        })
    }
}

/// One column of a walk-to-JSON discovery table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkColumn {
    pub macro_name: String,
    pub oid_prefix: String,
    pub format: SnmpFormat,
}

/// Parse repeated `{#MACRO}\noid\nformat` triples
pub fn parse_walk_columns(params: &str) -> Result<Vec<WalkColumn>, String> {
    let lines: Vec<&str> = params.lines().collect();
    if lines.is_empty() || lines.len() % 3 != 0 {
        return Err("expected macro, OID and format for every column".to_string());
    }

    lines
        .chunks(3)
        .map(|chunk| {
            let macro_name = chunk[0].trim();
            if macro_name.is_empty() {
                return Err("macro name is not specified".to_string());
            }
            Ok(WalkColumn {
                macro_name: macro_name.to_string(),
                oid_prefix: normalize_oid(chunk[1]),
                format: SnmpFormat::parse(chunk[2])?,
            })
        })
        .collect()
}

fn walk_table(value: &Value, cache: Option<&ParseCache>, snmp: &dyn SnmpWalk) -> Result<Arc<Artifact>, String> {
    match cache.filter(|c| c.kind() == StepKind::SnmpWalkValue) {
        Some(cache) => cache.get_or_parse(value, |text| snmp.parse(text).map(Artifact::Snmp)),
        None => {
            let text = value.clone().into_string()?;
            snmp.parse(&text).map(|table| Arc::new(Artifact::Snmp(table)))
        }
    }
}

/// Extract one OID from walk output
pub fn walk_value(
    value: &mut Value,
    params: &str,
    cache: Option<&ParseCache>,
    snmp: &dyn SnmpWalk,
) -> Result<(), String> {
    let parsed = WalkValueParams::parse(params)?;
    let artifact = walk_table(value, cache, snmp)?;
    let table = artifact
        .as_snmp()
        .ok_or_else(|| "cached data has unexpected format".to_string())?;

    let entry = table
        .lookup(&parsed.oid)
        .ok_or_else(|| format!("no data was found for OID \"{}\"", parsed.oid))?;
    *value = Value::String(parsed.format.apply(&entry.kind, &entry.value)?);
    Ok(())
}

fn discovery_rows(table: &SnmpTable, columns: &[WalkColumn]) -> Result<Vec<Json>, String> {
    let mut rows: Map<String, Json> = Map::new();

    for column in columns {
        let prefix = format!("{}.", column.oid_prefix);
        for entry in table.entries() {
            let Some(index) = entry.oid.strip_prefix(&prefix) else {
                continue;
            };
            let rendered = column.format.apply(&entry.kind, &entry.value)?;
            let row = rows.entry(index.to_string()).or_insert_with(|| {
                let mut row = Map::new();
                row.insert("{#SNMPINDEX}".to_string(), Json::String(index.to_string()));
                Json::Object(row)
            });
            if let Json::Object(row) = row {
                row.insert(column.macro_name.clone(), Json::String(rendered));
            }
        }
    }

    Ok(rows.into_iter().map(|(_, row)| row).collect())
}

/// Build a discovery JSON array from walk output
pub fn walk_to_json(value: &mut Value, params: &str, snmp: &dyn SnmpWalk) -> Result<(), String> {
    let columns = parse_walk_columns(params)?;
    let text = value.clone().into_string()?;
    let table = snmp.parse(&text)?;

    *value = Value::String(Json::Array(discovery_rows(&table, &columns)?).to_string());
    Ok(())
}

/// Apply a format to a single `TYPE: value` result
pub fn get_value(value: &mut Value, params: &str) -> Result<(), String> {
    let format = SnmpFormat::parse(params)?;
    let text = value.clone().into_string()?;
    let (kind, raw) = split_type(&text);
    let raw = raw.trim();
    let raw = raw
        .strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .unwrap_or(raw);

    *value = Value::String(format.apply(kind, raw)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::BuiltinSnmp;

    const WALK: &str = ".1.3.6.1.2.1.2.2.1.2.1 = STRING: \"lo\"
.1.3.6.1.2.1.2.2.1.2.2 = STRING: \"eth0\"
.1.3.6.1.2.1.2.2.1.6.1 = \"\"
.1.3.6.1.2.1.2.2.1.6.2 = Hex-STRING: 00 50 56 A1 2B 3C
.1.3.6.1.2.1.31.1.1.1.18.2 = Hex-STRING: 75 70 6C 69 6E 6B
";

    #[test]
    fn test_format_parse() {
        assert_eq!(SnmpFormat::parse("2").unwrap(), SnmpFormat::Mac);
        assert!(SnmpFormat::parse("9").is_err());
    }

    #[test]
    fn test_walk_value_formats() {
        let mut value = Value::string(WALK);
        walk_value(&mut value, "1.3.6.1.2.1.2.2.1.6.2\n2", None, &BuiltinSnmp).unwrap();
        assert_eq!(value, Value::string("00:50:56:a1:2b:3c"));

        let mut value = Value::string(WALK);
        walk_value(&mut value, ".1.3.6.1.2.1.31.1.1.1.18.2\n1", None, &BuiltinSnmp).unwrap();
        assert_eq!(value, Value::string("uplink"));

        let mut value = Value::string(WALK);
        walk_value(&mut value, ".1.3.6.1.2.1.2.2.1.2.2\n0", None, &BuiltinSnmp).unwrap();
        assert_eq!(value, Value::string("eth0"));
    }

    #[test]
    fn test_walk_value_missing_oid() {
        let mut value = Value::string(WALK);
        let err = walk_value(&mut value, ".1.3.6.9\n0", None, &BuiltinSnmp).unwrap_err();
        assert_eq!(err, "no data was found for OID \".1.3.6.9\"");
    }

    #[test]
    fn test_walk_value_fills_cache() {
        let raw = Value::string(WALK);
        let cache = ParseCache::create(StepKind::SnmpWalkValue, &raw);
        let mut value = raw.clone();
        walk_value(&mut value, ".1.3.6.1.2.1.2.2.1.2.1\n0", Some(&cache), &BuiltinSnmp).unwrap();
        assert_eq!(value, Value::string("lo"));
        assert!(cache.has_artifact());
    }

    #[test]
    fn test_walk_to_json() {
        let mut value = Value::string(WALK);
        walk_to_json(
            &mut value,
            "{#IFNAME}\n.1.3.6.1.2.1.2.2.1.2\n0\n{#IFMAC}\n.1.3.6.1.2.1.2.2.1.6\n2",
            &BuiltinSnmp,
        )
        .unwrap();

        let rows: serde_json::Value = serde_json::from_str(value.as_str().unwrap()).unwrap();
        assert_eq!(
            rows,
            serde_json::json!([
                {"{#SNMPINDEX}": "1", "{#IFNAME}": "lo", "{#IFMAC}": ""},
                {"{#SNMPINDEX}": "2", "{#IFNAME}": "eth0", "{#IFMAC}": "00:50:56:a1:2b:3c"}
            ])
        );
    }

    #[test]
    fn test_walk_columns_need_triples() {
        assert!(parse_walk_columns("{#A}\n.1.2").is_err());
        assert_eq!(parse_walk_columns("{#A}\n1.2\n0").unwrap()[0].oid_prefix, ".1.2");
    }

    #[test]
    fn test_get_value_bits() {
        let mut value = Value::string("BITS: 80 40 up(0) down(9)");
        get_value(&mut value, "3").unwrap();
        // bits 0 and 9
        assert_eq!(value, Value::string("513"));
    }

    #[test]
    fn test_get_value_hex_utf8() {
        let mut value = Value::string("Hex-STRING: 68 69");
        get_value(&mut value, "1").unwrap();
        assert_eq!(value, Value::string("hi"));

        let mut value = Value::string("STRING: \"plain\"");
        get_value(&mut value, "1").unwrap();
        assert_eq!(value, Value::string("plain"));
    }
}
