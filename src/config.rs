use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::data::field::Field;
use crate::data::model::Value;
use crate::display::DisplayRole;
use crate::state::Pivot;

// ---------------------------------------------------------------------------
// PivotConfig – field definitions and initial state from JSON
// ---------------------------------------------------------------------------

/// Engine setup read from a JSON file:
///
/// ```json
/// {
///   "fields": [
///     { "name": "zip_code",   "type": "integer", "filterable": true },
///     { "name": "pseudo_zip", "type": "integer", "filterable": true,
///       "pseudo": "increment:zip_code" }
///   ],
///   "label":   ["last_name"],
///   "summary": ["last_name", "zip_code"],
///   "filters": { "last_name": "Jackson" }
/// }
/// ```
///
/// Pseudo keys not registered on the engine are resolved against the
/// builtin function library.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PivotConfig {
    pub fields: Vec<Field>,
    #[serde(default)]
    pub label: Option<Vec<String>>,
    #[serde(default)]
    pub summary: Option<Vec<String>>,
    #[serde(default)]
    pub filters: BTreeMap<String, JsonValue>,
}

impl PivotConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Filter literals as typed values, still uncoerced.
    pub fn filter_literals(&self) -> Result<Vec<(String, Value)>> {
        self.filters
            .iter()
            .map(|(name, raw)| {
                Value::from_json(raw)
                    .map(|v| (name.clone(), v))
                    .with_context(|| format!("filter '{name}' must be a string, number or bool"))
            })
            .collect()
    }

    /// Install fields, display roles and staged filters on an engine.
    pub fn apply_to(&self, pivot: &mut Pivot) -> Result<()> {
        pivot
            .set_fields(self.fields.clone())
            .context("installing field definitions")?;
        if let Some(names) = &self.label {
            pivot.set_display(DisplayRole::Label, names.as_slice())?;
        }
        if let Some(names) = &self.summary {
            pivot.set_display(DisplayRole::Summary, names.as_slice())?;
        }
        if !self.filters.is_empty() {
            pivot
                .set_filters(self.filter_literals()?)
                .context("staging configured filters")?;
        }
        Ok(())
    }
}
