use std::fmt;
use std::str::FromStr;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;

use crate::data::field::FieldRegistry;
use crate::data::model::{Record, Value};
use crate::error::{EngineError, Result};

// ---------------------------------------------------------------------------
// Display roles
// ---------------------------------------------------------------------------

/// Named purpose a subset of fields is shown for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayRole {
    Label,
    Summary,
}

impl fmt::Display for DisplayRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayRole::Label => write!(f, "label"),
            DisplayRole::Summary => write!(f, "summary"),
        }
    }
}

impl FromStr for DisplayRole {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "label" => Ok(DisplayRole::Label),
            "summary" => Ok(DisplayRole::Summary),
            _ => Err(EngineError::NotFound {
                kind: "display role",
                name: s.to_string(),
            }),
        }
    }
}

/// Field lists for the `label` and `summary` roles.  The two slots are
/// independent of each other and of filtering.
///
/// A role that was never set shows every field in registration order; a
/// role set to an empty list shows nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayRoles {
    label: Option<Vec<String>>,
    summary: Option<Vec<String>>,
}

impl DisplayRoles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the fields for a role, keeping the first occurrence of any
    /// repeated name.  Every name must be a registered field.
    pub fn set<S: AsRef<str>>(
        &mut self,
        role: DisplayRole,
        names: &[S],
        registry: &FieldRegistry,
    ) -> Result<()> {
        let mut fields: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            let field = registry.get(name.as_ref())?;
            if !fields.contains(&field.name) {
                fields.push(field.name.clone());
            }
        }
        log::debug!("display role {role} set to {fields:?}");
        *self.slot_mut(role) = Some(fields);
        Ok(())
    }

    /// The explicitly stored names; empty if the role was never set.
    pub fn get(&self, role: DisplayRole) -> &[String] {
        self.slot(role).as_deref().unwrap_or(&[])
    }

    pub fn is_set(&self, role: DisplayRole) -> bool {
        self.slot(role).is_some()
    }

    /// Field names a role projects, falling back to the whole registry.
    pub fn resolve<'a>(&'a self, role: DisplayRole, registry: &'a FieldRegistry) -> Vec<&'a str> {
        match self.slot(role) {
            Some(names) => names.iter().map(String::as_str).collect(),
            None => registry.names().collect(),
        }
    }

    /// Reduce each record to the role's fields, in listed order.  Fields a
    /// record does not carry are left out rather than padded.
    pub fn project<'r>(
        &self,
        role: DisplayRole,
        registry: &FieldRegistry,
        records: impl IntoIterator<Item = &'r Record>,
    ) -> Vec<Projection> {
        let names = self.resolve(role, registry);
        records
            .into_iter()
            .map(|rec| {
                Projection(
                    names
                        .iter()
                        .filter_map(|n| rec.get(n).map(|v| (n.to_string(), v.clone())))
                        .collect(),
                )
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.label = None;
        self.summary = None;
    }

    fn slot(&self, role: DisplayRole) -> &Option<Vec<String>> {
        match role {
            DisplayRole::Label => &self.label,
            DisplayRole::Summary => &self.summary,
        }
    }

    fn slot_mut(&mut self, role: DisplayRole) -> &mut Option<Vec<String>> {
        match role {
            DisplayRole::Label => &mut self.label,
            DisplayRole::Summary => &mut self.summary,
        }
    }
}

// ---------------------------------------------------------------------------
// Projection – one record reduced to a role's fields
// ---------------------------------------------------------------------------

/// Ordered `(field, value)` pairs; serialises as a JSON object.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Projection(pub Vec<(String, Value)>);

impl Projection {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Projection {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
