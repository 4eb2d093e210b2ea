//! Structured-data query engines used by the preprocessing steps.
//!
//! Each engine sits behind a small `Send + Sync` trait so that hosts can plug
//! in their own implementation (or a mock in tests). Built-in engines cover
//! JSON path, the Prometheus text exposition format and `snmpwalk` output.
//! XML has no built-in engine; steps needing it fail unless the host
//! provides one.
//!
//! # Main Types
//!
//! - [`JsonQuery`] / [`BuiltinJsonPath`] - JSON documents and path queries
//! - [`MetricQuery`] / [`BuiltinMetrics`] - Metric tables and pattern queries
//! - [`SnmpWalk`] / [`BuiltinSnmp`] - SNMP walk tables
//! - [`XmlQuery`] - XPath and XML to JSON (host supplied)
//! - [`Collaborators`] - The set of engines handed to the executor

pub mod jsonpath;
pub mod prometheus;
pub mod snmp;

pub use jsonpath::{BuiltinJsonPath, JsonDoc};
pub use prometheus::{BuiltinMetrics, Metric, MetricTable};
pub use snmp::{BuiltinSnmp, SnmpEntry, SnmpTable};

use std::fmt;
use std::sync::Arc;

/// JSON document parser and path evaluator
#[cfg_attr(test, mockall::automock)]
pub trait JsonQuery: Send + Sync {
    /// Parse a JSON document
    fn open(&self, text: &str) -> Result<JsonDoc, String>;

    /// Evaluate `path` against `doc`; `Ok(None)` when nothing matches
    fn query(&self, doc: &JsonDoc, path: &str) -> Result<Option<String>, String>;
}

/// Metric text parser and pattern evaluator
pub trait MetricQuery: Send + Sync {
    /// Parse metric exposition text into a table
    fn parse(&self, text: &str) -> Result<MetricTable, String>;

    /// Select metrics by `pattern` and extract according to `request`/`output`
    fn query(&self, table: &MetricTable, pattern: &str, request: &str, output: &str) -> Result<String, String>;

    /// Render the metrics selected by `pattern` (all if empty) as a JSON array
    fn to_json(&self, table: &MetricTable, pattern: &str) -> Result<String, String>;
}

/// SNMP walk parser
pub trait SnmpWalk: Send + Sync {
    /// Parse `snmpwalk` style text into a table
    fn parse(&self, text: &str) -> Result<SnmpTable, String>;
}

/// XPath evaluation and XML conversion
pub trait XmlQuery: Send + Sync {
    /// Evaluate `expression`; `Ok(None)` when the node set is empty
    fn query_xpath(&self, text: &str, expression: &str) -> Result<Option<String>, String>;

    /// Convert an XML document to JSON text
    fn to_json(&self, text: &str) -> Result<String, String>;
}

/// Error reported by steps needing XML when no engine is installed
pub const XML_UNAVAILABLE: &str = "XML support is not available";

/// The query engines available to a pipeline run
#[derive(Clone)]
pub struct Collaborators {
    pub json: Arc<dyn JsonQuery>,
    pub metrics: Arc<dyn MetricQuery>,
    pub snmp: Arc<dyn SnmpWalk>,
    pub xml: Option<Arc<dyn XmlQuery>>,
}

impl Collaborators {
    pub fn with_json(mut self, json: Arc<dyn JsonQuery>) -> Self {
        self.json = json;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricQuery>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_snmp(mut self, snmp: Arc<dyn SnmpWalk>) -> Self {
        self.snmp = snmp;
        self
    }

    pub fn with_xml(mut self, xml: Arc<dyn XmlQuery>) -> Self {
        self.xml = Some(xml);
        self
    }

    /// The XML engine, or the standard "not available" error
    pub fn xml(&self) -> Result<&dyn XmlQuery, String> {
        self.xml.as_deref().ok_or_else(|| XML_UNAVAILABLE.to_string())
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            json: Arc::new(BuiltinJsonPath),
            metrics: Arc::new(BuiltinMetrics),
            snmp: Arc::new(BuiltinSnmp),
            xml: None,
        }
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("xml", &self.xml.is_some())
            .finish_non_exhaustive()
    }
}
