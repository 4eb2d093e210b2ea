//! Steps querying structured documents: JSON path, XPath and metric patterns.
//!
//! JSON path and metric pattern steps read a shared [`ParseCache`] artifact
//! when one of the matching kind is available, and fill it on first use.

use crate::pipeline::cache::{Artifact, ParseCache};
use crate::pipeline::step::StepKind;
use crate::query::{JsonQuery, MetricQuery, MetricTable, XmlQuery};
use crate::types::Value;
use std::sync::Arc;

const STALE_ARTIFACT: &str = "cached data has unexpected format";

/// Extract a value by JSON path
pub fn json_path(
    value: &mut Value,
    params: &str,
    cache: Option<&ParseCache>,
    json: &dyn JsonQuery,
) -> Result<(), String> {
    let wrap = |e: String| format!("cannot extract value from json by path \"{}\": {}", params, e);

    let found = match cache.filter(|c| c.kind() == StepKind::JsonPath) {
        Some(cache) => {
            let artifact = cache
                .get_or_parse(value, |text| json.open(text).map(Artifact::Json))
                .map_err(wrap)?;
            let doc = artifact.as_json().ok_or_else(|| wrap(STALE_ARTIFACT.to_string()))?;
            json.query(doc, params)
        }
        None => {
            let text = value.clone().into_string().map_err(wrap)?;
            let doc = json.open(&text).map_err(wrap)?;
            json.query(&doc, params)
        }
    }
    .map_err(wrap)?;

    match found {
        Some(text) => {
            *value = Value::String(text);
            Ok(())
        }
        None => Err(wrap("no data matches the specified path".to_string())),
    }
}

/// Extract a value by XPath expression
pub fn xpath(value: &mut Value, params: &str, xml: Result<&dyn XmlQuery, String>) -> Result<(), String> {
    let wrap = |e: String| format!("cannot extract XML value with xpath \"{}\": {}", params, e);

    let xml = xml.map_err(wrap)?;
    let text = value.clone().into_string().map_err(wrap)?;
    match xml.query_xpath(&text, params).map_err(wrap)? {
        Some(found) => {
            *value = Value::String(found);
            Ok(())
        }
        None => Err(wrap("no data matches the specified xpath".to_string())),
    }
}

/// Convert an XML document to JSON
pub fn xml_to_json(value: &mut Value, xml: Result<&dyn XmlQuery, String>) -> Result<(), String> {
    let xml = xml?;
    let text = value.clone().into_string()?;
    *value = Value::String(xml.to_json(&text)?);
    Ok(())
}

/// `pattern\nrequest\noutput` parameters of a metric pattern step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricPatternParams<'a> {
    pub pattern: &'a str,
    pub request: &'a str,
    pub output: &'a str,
}

impl<'a> MetricPatternParams<'a> {
    pub fn parse(params: &'a str) -> Result<Self, String> {
        let (pattern, rest) = params
            .split_once('\n')
            .ok_or_else(|| "cannot find second parameter".to_string())?;
        let (request, output) = rest
            .split_once('\n')
            .ok_or_else(|| "cannot find third parameter".to_string())?;
        Ok(Self {
            pattern,
            request,
            output,
        })
    }
}

/// The metric table for `value`, shared through the cache when it was made for metrics
fn metric_table(
    value: &Value,
    cache: Option<&ParseCache>,
    metrics: &dyn MetricQuery,
) -> Result<Arc<Artifact>, String> {
    match cache.filter(|c| c.kind() == StepKind::MetricPattern) {
        Some(cache) => cache.get_or_parse(value, |text| metrics.parse(text).map(Artifact::Metrics)),
        None => {
            let text = value.clone().into_string()?;
            metrics.parse(&text).map(|table| Arc::new(Artifact::Metrics(table)))
        }
    }
}

fn as_metrics(artifact: &Artifact) -> Result<&MetricTable, String> {
    artifact.as_metrics().ok_or_else(|| STALE_ARTIFACT.to_string())
}

/// Select metrics by pattern and extract a value, a label or an aggregate
pub fn metric_pattern(
    value: &mut Value,
    params: &str,
    cache: Option<&ParseCache>,
    metrics: &dyn MetricQuery,
) -> Result<(), String> {
    let parsed = MetricPatternParams::parse(params)?;
    let wrap = |e: String| format!("cannot apply Prometheus pattern: {}", e);

    let artifact = metric_table(value, cache, metrics).map_err(wrap)?;
    let table = as_metrics(&artifact).map_err(wrap)?;
    let result = metrics
        .query(table, parsed.pattern, parsed.request, parsed.output)
        .map_err(wrap)?;

    *value = Value::String(result);
    Ok(())
}

/// Render the metrics selected by `params` as a JSON array
pub fn metric_to_json(
    value: &mut Value,
    params: &str,
    cache: Option<&ParseCache>,
    metrics: &dyn MetricQuery,
) -> Result<(), String> {
    let wrap = |e: String| format!("cannot convert Prometheus data to JSON: {}", e);

    let artifact = metric_table(value, cache, metrics).map_err(wrap)?;
    let table = as_metrics(&artifact).map_err(wrap)?;
    *value = Value::String(metrics.to_json(table, params).map_err(wrap)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{BuiltinJsonPath, BuiltinMetrics, MockJsonQuery, XML_UNAVAILABLE};

    const METRICS: &str = "# HELP http_requests_total Total requests
# TYPE http_requests_total counter
http_requests_total{method=\"get\",code=\"200\"} 1027
http_requests_total{method=\"post\",code=\"200\"} 3
";

    #[test]
    fn test_json_path_extracts() {
        let mut value = Value::string(r#"{"a":{"b":7}}"#);
        json_path(&mut value, "$.a.b", None, &BuiltinJsonPath).unwrap();
        assert_eq!(value, Value::string("7"));
    }

    #[test]
    fn test_json_path_no_match() {
        let mut value = Value::string(r#"{"a":1}"#);
        let err = json_path(&mut value, "$.x", None, &BuiltinJsonPath).unwrap_err();
        assert_eq!(
            err,
            "cannot extract value from json by path \"$.x\": no data matches the specified path"
        );
    }

    #[test]
    fn test_json_path_uses_cache_once() {
        let mut json = MockJsonQuery::new();
        json.expect_open()
            .times(1)
            .returning(|text| BuiltinJsonPath.open(text));
        json.expect_query()
            .times(2)
            .returning(|doc, path| BuiltinJsonPath.query(doc, path));

        let raw = Value::string(r#"{"a":1,"b":2}"#);
        let cache = ParseCache::create(StepKind::JsonPath, &raw);

        let mut first = raw.clone();
        json_path(&mut first, "$.a", Some(&cache), &json).unwrap();
        assert_eq!(first, Value::string("1"));

        // the artifact is ready, so the step gets no raw value
        let mut second = Value::None;
        ParseCache::prepare_input(Some(&cache), StepKind::JsonPath, &mut second);
        json_path(&mut second, "$.b", Some(&cache), &json).unwrap();
        assert_eq!(second, Value::string("2"));
    }

    #[test]
    fn test_json_path_ignores_cache_of_other_kind() {
        let raw = Value::string(r#"{"a":1}"#);
        let cache = ParseCache::create(StepKind::MetricPattern, &raw);
        let mut value = raw.clone();
        json_path(&mut value, "$.a", Some(&cache), &BuiltinJsonPath).unwrap();
        assert!(!cache.has_artifact());
    }

    #[test]
    fn test_metric_pattern_params() {
        assert_eq!(
            MetricPatternParams::parse("up").unwrap_err(),
            "cannot find second parameter"
        );
        assert_eq!(
            MetricPatternParams::parse("up\nvalue").unwrap_err(),
            "cannot find third parameter"
        );
        let parsed = MetricPatternParams::parse("up\nlabel\njob").unwrap();
        assert_eq!(parsed.output, "job");
    }

    #[test]
    fn test_metric_pattern_value_and_function() {
        let mut value = Value::string(METRICS);
        metric_pattern(
            &mut value,
            "http_requests_total{method=\"get\"}\nvalue\n",
            None,
            &BuiltinMetrics,
        )
        .unwrap();
        assert_eq!(value, Value::string("1027"));

        let mut value = Value::string(METRICS);
        metric_pattern(&mut value, "http_requests_total\nfunction\nsum", None, &BuiltinMetrics).unwrap();
        assert_eq!(value, Value::string("1030"));
    }

    #[test]
    fn test_metric_pattern_no_match_is_wrapped() {
        let mut value = Value::string(METRICS);
        let err = metric_pattern(&mut value, "missing_metric\nvalue\n", None, &BuiltinMetrics).unwrap_err();
        assert!(err.starts_with("cannot apply Prometheus pattern: "));
    }

    #[test]
    fn test_metric_to_json_shares_metric_cache() {
        let raw = Value::string(METRICS);
        let cache = ParseCache::create(StepKind::MetricPattern, &raw);

        let mut value = raw.clone();
        metric_to_json(&mut value, "", Some(&cache), &BuiltinMetrics).unwrap();
        assert!(cache.has_artifact());

        let json: serde_json::Value = serde_json::from_str(value.as_str().unwrap()).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_xml_steps_without_engine() {
        let mut value = Value::string("<a>1</a>");
        let err = xpath(&mut value, "/a", Err(XML_UNAVAILABLE.to_string())).unwrap_err();
        assert_eq!(
            err,
            "cannot extract XML value with xpath \"/a\": XML support is not available"
        );
        assert_eq!(
            xml_to_json(&mut value, Err(XML_UNAVAILABLE.to_string())).unwrap_err(),
            XML_UNAVAILABLE
        );
    }
}
