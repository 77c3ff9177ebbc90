use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

// ---------------------------------------------------------------------------
// FieldType – declared type of a field
// ---------------------------------------------------------------------------

/// Declared type of a field.  Anything that is not one of the built-in names
/// is a `Custom` type that needs a converter registered under that name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Custom(String),
}

impl FieldType {
    /// Canonical lowercase name, also the key converters are registered under.
    pub fn name(&self) -> &str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Custom(name) => name,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" | "str" | "text" => FieldType::String,
            "integer" | "int" | "i64" => FieldType::Integer,
            "float" | "f64" | "number" => FieldType::Float,
            "boolean" | "bool" => FieldType::Boolean,
            "date" => FieldType::Date,
            _ => FieldType::Custom(s.trim().to_string()),
        }
    }
}

impl From<String> for FieldType {
    fn from(s: String) -> Self {
        FieldType::parse(&s)
    }
}

impl From<FieldType> for String {
    fn from(t: FieldType) -> Self {
        t.name().to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ---------------------------------------------------------------------------
// Field – one column definition
// ---------------------------------------------------------------------------

/// A named, typed column.  A pseudo field carries the key of a compute
/// function registered with the engine instead of being read from input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub filterable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pseudo: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Field {
            name: name.into(),
            field_type,
            filterable: false,
            pseudo: None,
        }
    }

    pub fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    /// Turn this into a pseudo field computed by the function registered
    /// under `key`.
    pub fn computed_by(mut self, key: impl Into<String>) -> Self {
        self.pseudo = Some(key.into());
        self
    }

    pub fn is_pseudo(&self) -> bool {
        self.pseudo.is_some()
    }
}

// ---------------------------------------------------------------------------
// FieldRegistry
// ---------------------------------------------------------------------------

/// Field definitions in registration order.  Names are unique.
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    fields: Vec<Field>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every field.  On a duplicate name the registry is unchanged.
    pub fn set_fields(&mut self, fields: Vec<Field>) -> Result<()> {
        let mut seen = BTreeSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(EngineError::config(format!(
                    "duplicate field name '{}'",
                    field.name
                )));
            }
        }
        self.fields = fields;
        Ok(())
    }

    pub fn add_field(&mut self, field: Field) -> Result<()> {
        if self.position(&field.name).is_some() {
            return Err(EngineError::config(format!(
                "duplicate field name '{}'",
                field.name
            )));
        }
        self.fields.push(field);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&Field> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| EngineError::field_not_found(name))
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn pseudo_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.is_pseudo())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> Vec<Field> {
        vec![
            Field::new("last_name", FieldType::String).filterable(),
            Field::new("first_name", FieldType::String).filterable(),
            Field::new("zip_code", FieldType::Integer).filterable(),
        ]
    }

    #[test]
    fn set_replaces_and_keeps_order() {
        let mut reg = FieldRegistry::new();
        reg.set_fields(vec![Field::new("old", FieldType::String)]).unwrap();
        reg.set_fields(people()).unwrap();

        let names: Vec<_> = reg.names().collect();
        assert_eq!(names, ["last_name", "first_name", "zip_code"]);
        assert_eq!(reg.get("zip_code").unwrap().field_type, FieldType::Integer);
        assert!(reg.get("zip_code").unwrap().filterable);
    }

    #[test]
    fn duplicate_names_are_rejected_without_side_effects() {
        let mut reg = FieldRegistry::new();
        reg.set_fields(people()).unwrap();

        let mut dup = people();
        dup.push(Field::new("zip_code", FieldType::String));
        assert!(matches!(reg.set_fields(dup), Err(EngineError::Configuration(_))));
        assert_eq!(reg.len(), 3);

        let err = reg.add_field(Field::new("last_name", FieldType::String));
        assert!(matches!(err, Err(EngineError::Configuration(_))));
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn add_appends() {
        let mut reg = FieldRegistry::new();
        reg.set_fields(people()).unwrap();
        reg.add_field(Field::new("not_a_real_field", FieldType::Date).filterable())
            .unwrap();
        assert_eq!(reg.len(), 4);
        assert_eq!(reg.position("not_a_real_field"), Some(3));
    }

    #[test]
    fn unknown_field_is_not_found() {
        let reg = FieldRegistry::new();
        assert!(matches!(reg.get("nope"), Err(EngineError::NotFound { .. })));
    }

    #[test]
    fn field_definitions_read_from_json() {
        let json = r#"[
            {"name": "zip_code", "type": "integer", "filterable": true},
            {"name": "pseudo_zip", "type": "integer", "filterable": true, "pseudo": "increment:zip_code"},
            {"name": "code", "type": "sku"}
        ]"#;
        let fields: Vec<Field> = serde_json::from_str(json).unwrap();

        assert_eq!(fields[0].field_type, FieldType::Integer);
        assert!(!fields[0].is_pseudo());
        assert_eq!(fields[1].pseudo.as_deref(), Some("increment:zip_code"));
        assert_eq!(fields[2].field_type, FieldType::Custom("sku".into()));
        assert!(!fields[2].filterable);
    }
}
