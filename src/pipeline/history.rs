//! Cross-run memory of stateful steps.
//!
//! [`StepHistory`] maps a step position to the value and timestamp that step
//! recorded on the previous run. A run reads the whole history, builds a new
//! one, and replaces the old history with it when it finishes; a run ending
//! in an error drops the history instead.

use crate::types::{Timestamp, Value};
use std::collections::BTreeMap;

/// Value and timestamp recorded by one step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryEntry {
    pub value: Value,
    pub timestamp: Timestamp,
}

impl HistoryEntry {
    pub fn new(value: Value, timestamp: Timestamp) -> Self {
        Self { value, timestamp }
    }
}

/// Sparse store of history entries indexed by step position
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepHistory {
    entries: BTreeMap<usize, HistoryEntry>,
}

impl StepHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return the entry of step `index`
    pub fn pop(&mut self, index: usize) -> Option<HistoryEntry> {
        self.entries.remove(&index)
    }

    /// Insert or overwrite the entry of step `index`
    pub fn add(&mut self, index: usize, value: Value, timestamp: Timestamp) {
        self.entries.insert(index, HistoryEntry::new(value, timestamp));
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(&index)
    }

    /// Drop every entry
    pub fn discard(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &HistoryEntry)> {
        self.entries.iter().map(|(i, e)| (*i, e))
    }
}

/// History view handed to a single step.
///
/// `value_in` is what the step recorded last time (`Value::None` if nothing).
/// The step writes `value_out` and may move `timestamp` forward.
#[derive(Debug, Clone, Default)]
pub struct HistorySlot {
    pub value_in: Value,
    pub value_out: Value,
    pub timestamp: Timestamp,
}

impl HistorySlot {
    pub fn from_entry(entry: Option<HistoryEntry>) -> Self {
        match entry {
            Some(entry) => Self {
                value_in: entry.value,
                value_out: Value::None,
                timestamp: entry.timestamp,
            },
            None => Self::default(),
        }
    }

    /// The entry to persist, if the step produced one
    pub fn into_entry(self) -> Option<HistoryEntry> {
        match self.value_out {
            Value::None => None,
            value => Some(HistoryEntry::new(value, self.timestamp)),
        }
    }
}
