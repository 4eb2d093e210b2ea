//! Built-in JSON path engine over `serde_json`.
//!
//! Supported syntax:
//!
//! ```text
//! $                 root
//! .name ['name']    child member
//! [n] [-n]          array element (negative counts from the end)
//! .* [*]            every member / element
//! ..name ..*        recursive descent
//! .length() .first() .sum() .min() .max() .avg()   trailing function
//! ```
//!
//! A path made only of members and indexes is *definite* and yields a single
//! value: strings are returned unquoted, anything else as JSON text. Other
//! paths yield a JSON array of all matches.

use crate::query::JsonQuery;
use crate::types::{format_double, parse_double};
use serde_json::Value as Json;

/// A parsed JSON document
#[derive(Debug, Clone, PartialEq)]
pub struct JsonDoc {
    root: Json,
}

impl JsonDoc {
    pub fn new(root: Json) -> Self {
        Self { root }
    }

    /// Parse JSON text
    pub fn parse(text: &str) -> Result<Self, String> {
        serde_json::from_str(text)
            .map(Self::new)
            .map_err(|e| format!("cannot parse as a valid JSON object: {}", e))
    }

    pub fn root(&self) -> &Json {
        &self.root
    }
}

/// JSON path engine backed by `serde_json`
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinJsonPath;

impl JsonQuery for BuiltinJsonPath {
    fn open(&self, text: &str) -> Result<JsonDoc, String> {
        JsonDoc::parse(text)
    }

    fn query(&self, doc: &JsonDoc, path: &str) -> Result<Option<String>, String> {
        JsonPath::parse(path)?.evaluate(doc.root())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Child(String),
    Index(i64),
    Wildcard,
    /// Recursive descent; `None` selects every descendant
    Descendant(Option<String>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Function {
    Length,
    First,
    Sum,
    Min,
    Max,
    Avg,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "length" => Some(Function::Length),
            "first" => Some(Function::First),
            "sum" => Some(Function::Sum),
            "min" => Some(Function::Min),
            "max" => Some(Function::Max),
            "avg" => Some(Function::Avg),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Function::Length => "length",
            Function::First => "first",
            Function::Sum => "sum",
            Function::Min => "min",
            Function::Max => "max",
            Function::Avg => "avg",
        }
    }

    fn apply(&self, items: &[&Json]) -> Result<Option<String>, String> {
        let result = match self {
            Function::Length => return Ok(Some(items.len().to_string())),
            Function::First => return Ok(items.first().map(|v| render(v))),
            Function::Sum => self.numbers(items)?.map(|n| n.iter().sum()),
            Function::Min => self
                .numbers(items)?
                .map(|n| n.iter().copied().fold(f64::INFINITY, f64::min)),
            Function::Max => self
                .numbers(items)?
                .map(|n| n.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
            Function::Avg => self
                .numbers(items)?
                .map(|n| n.iter().sum::<f64>() / n.len() as f64),
        };
        Ok(result.map(format_double))
    }

    /// Numeric inputs of an aggregate; `None` when there are no inputs
    fn numbers(&self, items: &[&Json]) -> Result<Option<Vec<f64>>, String> {
        if items.is_empty() {
            return Ok(None);
        }
        items
            .iter()
            .map(|item| match item {
                Json::Number(n) => n.as_f64(),
                Json::String(s) => parse_double(s),
                _ => None,
            })
            .collect::<Option<Vec<f64>>>()
            .map(Some)
            .ok_or_else(|| format!("non-numeric input of function \"{}()\"", self.name()))
    }
}

/// A compiled JSON path
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPath {
    segments: Vec<Segment>,
    function: Option<Function>,
}

impl JsonPath {
    pub fn parse(path: &str) -> Result<Self, String> {
        let err = |msg: &str| format!("invalid JSONPath \"{}\": {}", path, msg);

        let mut rest = path
            .trim()
            .strip_prefix('$')
            .ok_or_else(|| err("path must start with '$'"))?;
        let mut segments = Vec::new();
        let mut function = None;

        while !rest.is_empty() {
            if function.is_some() {
                return Err(err("function must be the last element"));
            }

            if let Some(r) = rest.strip_prefix("..") {
                if let Some(r) = r.strip_prefix('*') {
                    segments.push(Segment::Descendant(None));
                    rest = r;
                } else if r.starts_with('[') {
                    let (segment, r) = parse_bracket(r).map_err(|m| err(&m))?;
                    match segment {
                        Segment::Child(name) => segments.push(Segment::Descendant(Some(name))),
                        Segment::Wildcard => segments.push(Segment::Descendant(None)),
                        _ => return Err(err("index after '..' is not supported")),
                    }
                    rest = r;
                } else {
                    let (name, r) = take_name(r);
                    if name.is_empty() {
                        return Err(err("missing member name after '..'"));
                    }
                    segments.push(Segment::Descendant(Some(name.to_string())));
                    rest = r;
                }
            } else if let Some(r) = rest.strip_prefix('.') {
                if let Some(r) = r.strip_prefix('*') {
                    segments.push(Segment::Wildcard);
                    rest = r;
                    continue;
                }
                let (name, r) = take_name(r);
                if name.is_empty() {
                    return Err(err("missing member name after '.'"));
                }
                if let Some(r) = r.strip_prefix("()") {
                    function = Some(
                        Function::from_name(name)
                            .ok_or_else(|| err(&format!("unknown function \"{}\"", name)))?,
                    );
                    rest = r;
                } else {
                    segments.push(Segment::Child(name.to_string()));
                    rest = r;
                }
            } else if rest.starts_with('[') {
                let (segment, r) = parse_bracket(rest).map_err(|m| err(&m))?;
                segments.push(segment);
                rest = r;
            } else {
                return Err(err(&format!("unexpected text \"{}\"", rest)));
            }
        }

        Ok(Self { segments, function })
    }

    /// True if the path can match at most one value
    pub fn is_definite(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, Segment::Child(_) | Segment::Index(_)))
    }

    /// Evaluate against `root`; `Ok(None)` when nothing matches
    pub fn evaluate(&self, root: &Json) -> Result<Option<String>, String> {
        let mut current = vec![root];
        for segment in &self.segments {
            let mut next = Vec::new();
            for node in current {
                select(segment, node, &mut next);
            }
            current = next;
        }

        let definite = self.is_definite();

        match self.function {
            None => {
                if current.is_empty() {
                    Ok(None)
                } else if definite {
                    Ok(Some(render(current[0])))
                } else {
                    let array = Json::Array(current.into_iter().cloned().collect());
                    Ok(Some(array.to_string()))
                }
            }
            Some(function) => {
                let items: Vec<&Json> = match (definite, current.first()) {
                    (true, Some(Json::Array(array))) => array.iter().collect(),
                    (true, Some(_)) => current,
                    (true, None) => return Ok(None),
                    (false, _) => current,
                };
                function.apply(&items)
            }
        }
    }
}

fn take_name(s: &str) -> (&str, &str) {
    let end = s.find(['.', '[', '(']).unwrap_or(s.len());
    s.split_at(end)
}

fn parse_bracket(s: &str) -> Result<(Segment, &str), String> {
    let inner = &s[1..];

    if let Some(quote) = inner.chars().next().filter(|c| *c == '\'' || *c == '"') {
        let body = &inner[1..];
        let end = body.find(quote).ok_or("unterminated quoted member name")?;
        let after = body[end + 1..].strip_prefix(']').ok_or("expected ']'")?;
        return Ok((Segment::Child(body[..end].to_string()), after));
    }

    let end = inner.find(']').ok_or("expected ']'")?;
    let token = inner[..end].trim();
    let after = &inner[end + 1..];

    if token == "*" {
        return Ok((Segment::Wildcard, after));
    }

    token
        .parse::<i64>()
        .map(|index| (Segment::Index(index), after))
        .map_err(|_| format!("unsupported selector \"[{}]\"", token))
}

fn select<'a>(segment: &Segment, node: &'a Json, out: &mut Vec<&'a Json>) {
    match segment {
        Segment::Child(name) => {
            if let Some(value) = node.as_object().and_then(|m| m.get(name)) {
                out.push(value);
            }
        }
        Segment::Index(index) => {
            if let Some(array) = node.as_array() {
                let len = array.len() as i64;
                let idx = if *index < 0 { len + index } else { *index };
                if (0..len).contains(&idx) {
                    out.push(&array[idx as usize]);
                }
            }
        }
        Segment::Wildcard => match node {
            Json::Object(map) => out.extend(map.values()),
            Json::Array(array) => out.extend(array.iter()),
            _ => {}
        },
        Segment::Descendant(name) => descend(node, name.as_deref(), out),
    }
}

fn descend<'a>(node: &'a Json, name: Option<&str>, out: &mut Vec<&'a Json>) {
    match node {
        Json::Object(map) => {
            for (key, value) in map {
                if name.map_or(true, |n| n == key) {
                    out.push(value);
                }
            }
            for value in map.values() {
                descend(value, name, out);
            }
        }
        Json::Array(array) => {
            for value in array {
                if name.is_none() {
                    out.push(value);
                }
                descend(value, name, out);
            }
        }
        _ => {}
    }
}

fn render(value: &Json) -> String {
    match value {
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(text: &str, path: &str) -> Result<Option<String>, String> {
        let doc = BuiltinJsonPath.open(text)?;
        BuiltinJsonPath.query(&doc, path)
    }

    const DOC: &str = r#"{"store":{"book":[{"title":"A","price":8.5},{"title":"B","price":12}],"name":"shop"},"ok":true}"#;

    #[test]
    fn test_definite_paths() {
        assert_eq!(query(DOC, "$.store.name").unwrap().as_deref(), Some("shop"));
        assert_eq!(query(DOC, "$['store']['book'][1].title").unwrap().as_deref(), Some("B"));
        assert_eq!(query(DOC, "$.store.book[-1].price").unwrap().as_deref(), Some("12"));
        assert_eq!(query(DOC, "$.ok").unwrap().as_deref(), Some("true"));
        assert_eq!(query(DOC, "$.store.book[0]").unwrap().as_deref(), Some(r#"{"title":"A","price":8.5}"#));
    }

    #[test]
    fn test_missing_path_is_none() {
        assert_eq!(query(DOC, "$.store.missing").unwrap(), None);
        assert_eq!(query(DOC, "$.store.book[5]").unwrap(), None);
    }

    #[test]
    fn test_indefinite_paths_return_arrays() {
        assert_eq!(query(DOC, "$.store.book[*].title").unwrap().as_deref(), Some(r#"["A","B"]"#));
        assert_eq!(query(DOC, "$..price").unwrap().as_deref(), Some("[8.5,12]"));
        assert_eq!(query(DOC, "$..nothing").unwrap(), None);
    }

    #[test]
    fn test_functions() {
        assert_eq!(query(DOC, "$.store.book.length()").unwrap().as_deref(), Some("2"));
        assert_eq!(query(DOC, "$..price.sum()").unwrap().as_deref(), Some("20.5"));
        assert_eq!(query(DOC, "$..price.max()").unwrap().as_deref(), Some("12"));
        assert_eq!(query(DOC, "$..title.first()").unwrap().as_deref(), Some("A"));
        assert!(query(DOC, "$..title.avg()").is_err());
    }

    #[test]
    fn test_invalid_paths() {
        assert!(JsonPath::parse("store.name").is_err());
        assert!(JsonPath::parse("$.a[").is_err());
        assert!(JsonPath::parse("$.a.bogus()").is_err());
        assert!(JsonPath::parse("$.length().a").is_err());
    }

    #[test]
    fn test_invalid_document() {
        let err = BuiltinJsonPath.open("{not json").unwrap_err();
        assert!(err.starts_with("cannot parse as a valid JSON object"));
    }
}
