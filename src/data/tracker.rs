use std::collections::BTreeMap;

use super::model::Value;
use crate::error::{EngineError, Result};

/// Distinct value → number of records carrying it.
pub type ValueCounts = BTreeMap<Value, usize>;

// ---------------------------------------------------------------------------
// ValueTracker – observed values of filterable pseudo fields
// ---------------------------------------------------------------------------

/// Value distribution of every filterable pseudo field, as seen by the last
/// successful build.  Only the record builder fills it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueTracker {
    index: BTreeMap<String, ValueCounts>,
}

impl ValueTracker {
    /// Start an empty index for each tracked field, so a field with no
    /// records still reports an (empty) distribution.
    pub(crate) fn for_fields<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        ValueTracker {
            index: names
                .into_iter()
                .map(|n| (n.to_string(), ValueCounts::new()))
                .collect(),
        }
    }

    pub(crate) fn observe(&mut self, field: &str, value: &Value) {
        if let Some(counts) = self.index.get_mut(field) {
            *counts.entry(value.clone()).or_insert(0) += 1;
        }
    }

    pub fn values_for(&self, field: &str) -> Result<&ValueCounts> {
        self.index.get(field).ok_or_else(|| EngineError::NotFound {
            kind: "pseudo value index",
            name: field.to_string(),
        })
    }

    pub fn tracked_fields(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.index.clear();
    }
}
