//! Built-in engine for the Prometheus text exposition format.
//!
//! Parses `# HELP` / `# TYPE` metadata and sample lines into a
//! [`MetricTable`], selects samples with a pattern such as
//! `http_requests_total{method="get",code=~"5.."}` and extracts a value, a
//! label, or an aggregate.

use crate::query::MetricQuery;
use crate::types::{format_double, parse_double};
use regex::Regex;
use serde_json::{json, Map, Value as Json};
use std::collections::HashMap;

/// One sample line
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: String,
    pub labels: Vec<(String, String)>,
    /// Value as written in the source text
    pub value: String,
    /// The source line
    pub line: String,
    pub help: Option<String>,
    pub kind: Option<String>,
}

impl Metric {
    pub fn label(&self, name: &str) -> Option<&str> {
        if name == "__name__" {
            return Some(&self.name);
        }
        self.labels
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn numeric_value(&self) -> Option<f64> {
        parse_sample_value(&self.value)
    }
}

/// Parsed metric exposition text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricTable {
    metrics: Vec<Metric>,
}

impl MetricTable {
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut help: HashMap<String, String> = HashMap::new();
        let mut kinds: HashMap<String, String> = HashMap::new();
        let mut metrics = Vec::new();

        for (row, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(comment) = line.strip_prefix('#') {
                let mut parts = comment.trim_start().splitn(3, char::is_whitespace);
                match (parts.next(), parts.next(), parts.next()) {
                    (Some("HELP"), Some(name), text) => {
                        help.insert(name.to_string(), text.unwrap_or("").trim().to_string());
                    }
                    (Some("TYPE"), Some(name), Some(kind)) => {
                        kinds.insert(name.to_string(), kind.trim().to_string());
                    }
                    _ => {}
                }
                continue;
            }

            let metric = parse_sample(line)
                .map_err(|e| format!("data parsing error at row {} \"{}\": {}", row + 1, line, e))?;
            metrics.push(metric);
        }

        for metric in &mut metrics {
            let family = family_name(&metric.name, &kinds);
            metric.help = help.get(family).cloned();
            metric.kind = kinds.get(family).cloned();
        }

        Ok(Self { metrics })
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Metrics matching `pattern` (all metrics for an empty pattern)
    pub fn select(&self, pattern: &str) -> Result<Vec<&Metric>, String> {
        if pattern.trim().is_empty() {
            return Ok(self.metrics.iter().collect());
        }
        let filter = MetricFilter::parse(pattern)?;
        Ok(self.metrics.iter().filter(|m| filter.matches(m)).collect())
    }
}

/// Summary and histogram series share the metadata of their base name
fn family_name<'a>(name: &'a str, kinds: &HashMap<String, String>) -> &'a str {
    if kinds.contains_key(name) {
        return name;
    }
    for suffix in ["_bucket", "_sum", "_count"] {
        if let Some(base) = name.strip_suffix(suffix) {
            if kinds.contains_key(base) {
                return base;
            }
        }
    }
    name
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == ':'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == ':'
}

fn take_identifier(s: &str) -> (&str, &str) {
    match s.chars().next() {
        Some(c) if is_name_start(c) => {
            let end = s.find(|c: char| !is_name_char(c)).unwrap_or(s.len());
            s.split_at(end)
        }
        _ => ("", s),
    }
}

/// Parse a double-quoted string with `\\`, `\"` and `\n` escapes
fn take_quoted(s: &str) -> Result<(String, &str), String> {
    let body = s.strip_prefix('"').ok_or("expected '\"'")?;
    let mut out = String::new();
    let mut chars = body.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((out, &body[i + 1..])),
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, other)) => out.push(other),
                None => break,
            },
            other => out.push(other),
        }
    }
    Err("unterminated label value".to_string())
}

fn parse_sample_value(s: &str) -> Option<f64> {
    match s {
        "+Inf" | "Inf" => Some(f64::INFINITY),
        "-Inf" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        _ => parse_double(s),
    }
}

fn parse_sample(line: &str) -> Result<Metric, String> {
    let (name, mut rest) = take_identifier(line);
    let mut labels = Vec::new();

    if let Some(body) = rest.strip_prefix('{') {
        let mut body = body.trim_start();
        loop {
            if let Some(after) = body.strip_prefix('}') {
                rest = after;
                break;
            }
            let (label, after) = take_identifier(body);
            if label.is_empty() {
                return Err("invalid label name".to_string());
            }
            let after = after
                .trim_start()
                .strip_prefix('=')
                .ok_or("expected '=' after label name")?;
            let (value, after) = take_quoted(after.trim_start())?;
            labels.push((label.to_string(), value));

            let after = after.trim_start();
            body = match after.strip_prefix(',') {
                Some(next) => next.trim_start(),
                None if after.starts_with('}') => after,
                None => return Err("expected ',' or '}' after label value".to_string()),
            };
        }
    }

    if name.is_empty() {
        return Err("invalid metric name".to_string());
    }

    let mut fields = rest.split_whitespace();
    let value = fields.next().ok_or("missing metric value")?;
    if parse_sample_value(value).is_none() {
        return Err(format!("invalid metric value \"{}\"", value));
    }
    if let Some(ts) = fields.next() {
        if ts.parse::<i64>().is_err() {
            return Err(format!("invalid timestamp \"{}\"", ts));
        }
    }
    if fields.next().is_some() {
        return Err("unexpected data after timestamp".to_string());
    }

    Ok(Metric {
        name: name.to_string(),
        labels,
        value: value.to_string(),
        line: line.to_string(),
        help: None,
        kind: None,
    })
}

#[derive(Debug)]
enum LabelOp {
    Equal(String),
    NotEqual(String),
    Matches(Regex),
    NotMatches(Regex),
}

#[derive(Debug)]
struct LabelMatcher {
    label: String,
    op: LabelOp,
}

impl LabelMatcher {
    fn matches(&self, metric: &Metric) -> bool {
        let value = metric.label(&self.label).unwrap_or("");
        match &self.op {
            LabelOp::Equal(v) => value == v,
            LabelOp::NotEqual(v) => value != v,
            LabelOp::Matches(re) => re.is_match(value),
            LabelOp::NotMatches(re) => !re.is_match(value),
        }
    }
}

/// Compiled selection pattern: `name{matchers} [== value]`
#[derive(Debug)]
struct MetricFilter {
    name: Option<String>,
    matchers: Vec<LabelMatcher>,
    value: Option<f64>,
}

impl MetricFilter {
    fn parse(pattern: &str) -> Result<Self, String> {
        let err = |msg: &str| format!("invalid pattern \"{}\": {}", pattern, msg);

        let (name, mut rest) = take_identifier(pattern.trim());
        let mut matchers = Vec::new();

        if let Some(body) = rest.strip_prefix('{') {
            let mut body = body.trim_start();
            loop {
                if let Some(after) = body.strip_prefix('}') {
                    rest = after;
                    break;
                }
                let (label, after) = take_identifier(body);
                if label.is_empty() {
                    return Err(err("invalid label name"));
                }
                let after = after.trim_start();
                let (op, after) = ["=~", "!~", "!=", "="]
                    .iter()
                    .find_map(|op| after.strip_prefix(op).map(|a| (*op, a)))
                    .ok_or_else(|| err("expected label operator"))?;
                let (value, after) = take_quoted(after.trim_start()).map_err(|m| err(&m))?;

                let op = match op {
                    "=" => LabelOp::Equal(value),
                    "!=" => LabelOp::NotEqual(value),
                    "=~" => LabelOp::Matches(anchored(&value).map_err(|m| err(&m))?),
                    _ => LabelOp::NotMatches(anchored(&value).map_err(|m| err(&m))?),
                };
                matchers.push(LabelMatcher {
                    label: label.to_string(),
                    op,
                });

                let after = after.trim_start();
                body = match after.strip_prefix(',') {
                    Some(next) => next.trim_start(),
                    None if after.starts_with('}') => after,
                    None => return Err(err("expected ',' or '}'")),
                };
            }
        }

        let rest = rest.trim();
        let value = if rest.is_empty() {
            None
        } else {
            let literal = rest
                .strip_prefix("==")
                .ok_or_else(|| err("unexpected text after selector"))?
                .trim();
            Some(parse_sample_value(literal).ok_or_else(|| err("invalid value filter"))?)
        };

        if name.is_empty() && matchers.is_empty() {
            return Err(err("metric name or label filter is expected"));
        }

        Ok(Self {
            name: (!name.is_empty()).then(|| name.to_string()),
            matchers,
            value,
        })
    }

    fn matches(&self, metric: &Metric) -> bool {
        if let Some(name) = &self.name {
            if &metric.name != name {
                return false;
            }
        }
        if let Some(expected) = self.value {
            match metric.numeric_value() {
                Some(v) if v == expected => {}
                _ => return false,
            }
        }
        self.matchers.iter().all(|m| m.matches(metric))
    }
}

fn anchored(pattern: &str) -> Result<Regex, String> {
    Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| format!("invalid regular expression: {}", e))
}

fn aggregate(function: &str, metrics: &[&Metric]) -> Result<String, String> {
    if function == "count" {
        return Ok(metrics.len().to_string());
    }

    let values = metrics
        .iter()
        .map(|m| m.numeric_value())
        .collect::<Option<Vec<f64>>>()
        .ok_or("metric value is not numeric")?;

    let result = match function {
        "sum" => values.iter().sum(),
        "min" => values.iter().copied().fold(f64::INFINITY, f64::min),
        "max" => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        "avg" => values.iter().sum::<f64>() / values.len() as f64,
        other => return Err(format!("unsupported function \"{}\"", other)),
    };
    Ok(format_double(result))
}

/// Prometheus text format engine
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinMetrics;

impl MetricQuery for BuiltinMetrics {
    fn parse(&self, text: &str) -> Result<MetricTable, String> {
        MetricTable::parse(text)
    }

    fn query(&self, table: &MetricTable, pattern: &str, request: &str, output: &str) -> Result<String, String> {
        let selected = table.select(pattern)?;
        if selected.is_empty() {
            return Err("no matching metrics found".to_string());
        }

        match request {
            "value" => match selected.as_slice() {
                [metric] => Ok(metric.value.clone()),
                _ => Err("multiple metrics match the specified pattern".to_string()),
            },
            "label" => match selected.as_slice() {
                [metric] => metric
                    .label(output)
                    .map(str::to_string)
                    .ok_or_else(|| format!("label \"{}\" was not found", output)),
                _ => Err("multiple metrics match the specified pattern".to_string()),
            },
            "function" => aggregate(output, &selected),
            other => Err(format!("unsupported request \"{}\"", other)),
        }
    }

    fn to_json(&self, table: &MetricTable, pattern: &str) -> Result<String, String> {
        let rows: Vec<Json> = table
            .select(pattern)?
            .into_iter()
            .map(|metric| {
                let mut row = Map::new();
                row.insert("name".into(), json!(metric.name));
                row.insert("value".into(), json!(metric.value));
                row.insert("line".into(), json!(metric.line));
                if !metric.labels.is_empty() {
                    let labels: Map<String, Json> = metric
                        .labels
                        .iter()
                        .map(|(k, v)| (k.clone(), json!(v)))
                        .collect();
                    row.insert("labels".into(), Json::Object(labels));
                }
                if let Some(kind) = &metric.kind {
                    row.insert("type".into(), json!(kind));
                }
                if let Some(help) = &metric.help {
                    row.insert("help".into(), json!(help));
                }
                Json::Object(row)
            })
            .collect();

        Ok(Json::Array(rows).to_string())
    }
}
