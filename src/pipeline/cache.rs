//! Reusable parse results shared between pipeline runs over one raw value.
//!
//! When several items are computed from the same collected payload (a JSON
//! document, a metrics page, an SNMP walk) the expensive parse happens once.
//! The first consumer stores the parsed [`Artifact`]; later consumers of the
//! same [`ParseCache`] query it directly.
//!
//! A cache is only created when the pipeline's first step is one of the
//! cacheable kinds, and it only serves that first step. Any step of another
//! kind falls back to the raw value.
//!
//! Holders share the cache by cloning it ([`ParseCache::copy`]) and give it
//! back with [`ParseCache::release`]; the artifact is destroyed together with
//! the last holder.

use crate::pipeline::step::{StepKind, StepSpec};
use crate::query::{JsonDoc, MetricTable, SnmpTable};
use crate::types::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::trace;

/// A parsed representation of the raw value
#[derive(Debug)]
pub enum Artifact {
    Json(JsonDoc),
    Metrics(MetricTable),
    Snmp(SnmpTable),
}

impl Artifact {
    pub fn name(&self) -> &'static str {
        match self {
            Artifact::Json(_) => "json",
            Artifact::Metrics(_) => "metrics",
            Artifact::Snmp(_) => "snmp",
        }
    }

    pub fn as_json(&self) -> Option<&JsonDoc> {
        match self {
            Artifact::Json(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_metrics(&self) -> Option<&MetricTable> {
        match self {
            Artifact::Metrics(table) => Some(table),
            _ => None,
        }
    }

    pub fn as_snmp(&self) -> Option<&SnmpTable> {
        match self {
            Artifact::Snmp(table) => Some(table),
            _ => None,
        }
    }
}

/// What the cache currently holds
#[derive(Debug, Clone)]
pub enum CacheState {
    /// Nothing parsed yet
    Empty,
    /// A parsed artifact
    Ready(Arc<Artifact>),
    /// The first parse failed with this message
    Failed(String),
}

#[derive(Debug)]
struct CacheInner {
    kind: StepKind,
    raw_value: Value,
    state: Mutex<CacheState>,
}

impl Drop for CacheInner {
    fn drop(&mut self) {
        let artifact = match self.state.get_mut() {
            Ok(CacheState::Ready(artifact)) => artifact.name(),
            _ => "none",
        };
        trace!(kind = %self.kind, artifact, "parse cache destroyed");
    }
}

/// Reference counted parse cache for one raw value
#[derive(Debug, Clone)]
pub struct ParseCache {
    inner: Arc<CacheInner>,
}

impl ParseCache {
    /// Create a cache for a pipeline whose first step is `first_step`
    pub fn create(first_step: StepKind, raw_value: &Value) -> Self {
        trace!(kind = %first_step, "parse cache created");
        Self {
            inner: Arc::new(CacheInner {
                kind: first_step,
                raw_value: raw_value.clone(),
                state: Mutex::new(CacheState::Empty),
            }),
        }
    }

    /// True if a cache would be used by `steps`
    pub fn is_cacheable(steps: &[StepSpec]) -> bool {
        steps.first().is_some_and(|step| step.kind.is_cacheable())
    }

    /// Create a cache when `steps` can use one
    pub fn for_steps(steps: &[StepSpec], raw_value: &Value) -> Option<Self> {
        if Self::is_cacheable(steps) {
            steps.first().map(|step| Self::create(step.kind, raw_value))
        } else {
            None
        }
    }

    /// Hand out another reference to the same cache
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Give back this reference. Returns true if it was the last one and the
    /// cache (with its artifact) has been destroyed.
    pub fn release(self) -> bool {
        Arc::into_inner(self.inner).is_some()
    }

    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Kind of the step the cache was created for
    pub fn kind(&self) -> StepKind {
        self.inner.kind
    }

    /// The value as it was before any step ran
    pub fn raw_value(&self) -> &Value {
        &self.inner.raw_value
    }

    pub fn state(&self) -> CacheState {
        self.lock().clone()
    }

    /// True if a parsed artifact (or a remembered parse failure) is present
    pub fn has_artifact(&self) -> bool {
        !matches!(*self.lock(), CacheState::Empty)
    }

    /// Make `out` ready for a step of kind `step`.
    ///
    /// Unless the cache holds an artifact made for this step kind, the step
    /// must work from the raw value, so it is copied into `out`. Otherwise
    /// `out` is left alone and the step reads the artifact.
    pub fn prepare_input(cache: Option<&ParseCache>, step: StepKind, out: &mut Value) {
        if let Some(cache) = cache {
            if cache.kind() != step || !cache.has_artifact() {
                *out = cache.raw_value().clone();
            }
        }
    }

    /// The cached artifact, parsing `value` with `parse` on first use.
    ///
    /// A parse failure is remembered, later calls fail with the same message
    /// without parsing again. A value that cannot be converted to text is
    /// not remembered.
    pub fn get_or_parse<F>(&self, value: &Value, parse: F) -> Result<Arc<Artifact>, String>
    where
        F: FnOnce(&str) -> Result<Artifact, String>,
    {
        let mut state = self.lock();
        match &*state {
            CacheState::Ready(artifact) => return Ok(Arc::clone(artifact)),
            CacheState::Failed(message) => return Err(message.clone()),
            CacheState::Empty => {}
        }

        let text = value.clone().into_string()?;
        match parse(&text) {
            Ok(artifact) => {
                trace!(kind = %self.inner.kind, artifact = artifact.name(), "parse cache filled");
                let artifact = Arc::new(artifact);
                *state = CacheState::Ready(Arc::clone(&artifact));
                Ok(artifact)
            }
            Err(message) => {
                trace!(kind = %self.inner.kind, %message, "parse cache remembers failure");
                *state = CacheState::Failed(message.clone());
                Err(message)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
