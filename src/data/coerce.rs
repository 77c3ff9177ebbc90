use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::field::FieldType;
use super::model::Value;
use crate::error::{EngineError, Result};

/// Turns trimmed text into a typed value, or explains why it cannot.
pub type Converter = fn(&str) -> std::result::Result<Value, String>;

/// Date layouts accepted by the default `date` converter, tried in order.
const DATE_LAYOUTS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

// ---------------------------------------------------------------------------
// Converters – per-type coercion table
// ---------------------------------------------------------------------------

/// Coercion of raw text and loosely typed values into a field's declared type.
///
/// `string` and `integer` are handled inline.  Every other type is looked up
/// by name in a table of pluggable converters; `Converters::default()` ships
/// `float`, `boolean` and `date`.
///
/// Ingested cells and filter literals go through the same path, so the
/// literal `"34471"` on an `integer` field compares equal to the stored
/// `34471`.
#[derive(Clone)]
pub struct Converters {
    table: BTreeMap<String, Converter>,
}

impl std::fmt::Debug for Converters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.table.keys()).finish()
    }
}

impl Default for Converters {
    fn default() -> Self {
        let mut table: BTreeMap<String, Converter> = BTreeMap::new();
        table.insert("float".into(), parse_float);
        table.insert("boolean".into(), parse_boolean);
        table.insert("date".into(), parse_date);
        Converters { table }
    }
}

impl Converters {
    /// A table without any pluggable converters.
    pub fn empty() -> Self {
        Converters {
            table: BTreeMap::new(),
        }
    }

    /// Register (or replace) the converter for a type name.
    pub fn register(&mut self, type_name: impl Into<String>, converter: Converter) {
        self.table.insert(type_name.into(), converter);
    }

    /// Whether values of this type can be produced at all.
    pub fn supports(&self, field_type: &FieldType) -> bool {
        matches!(field_type, FieldType::String | FieldType::Integer)
            || self.table.contains_key(field_type.name())
    }

    /// Coerce raw text (an ingested cell or a textual filter literal).
    pub fn coerce_str(&self, raw: &str, field_type: &FieldType) -> Result<Value> {
        let text = raw.trim();
        match field_type {
            FieldType::String => Ok(Value::String(text.to_string())),
            FieldType::Integer => text
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|e| coercion_error(raw, field_type, e.to_string())),
            other => {
                let convert = self.table.get(other.name()).ok_or_else(|| {
                    EngineError::config(format!("no converter registered for type '{other}'"))
                })?;
                convert(text).map_err(|reason| coercion_error(raw, other, reason))
            }
        }
    }

    /// Coerce an already typed value.  Values of the right variant pass
    /// through untouched, which makes coercion idempotent.
    pub fn coerce(&self, value: &Value, field_type: &FieldType) -> Result<Value> {
        match (value, field_type) {
            (Value::String(s), _) => self.coerce_str(s, field_type),
            (Value::Integer(_), FieldType::Integer)
            | (Value::Float(_), FieldType::Float)
            | (Value::Boolean(_), FieldType::Boolean)
            | (Value::Date(_), FieldType::Date) => Ok(value.clone()),
            (Value::Integer(i), FieldType::Float) => Ok(Value::Float(*i as f64)),
            (_, FieldType::String) => Ok(Value::String(value.to_string())),
            (_, FieldType::Custom(_)) => self.coerce_str(&value.to_string(), field_type),
            _ => Err(coercion_error(
                &value.to_string(),
                field_type,
                "incompatible value type".to_string(),
            )),
        }
    }
}

fn coercion_error(raw: &str, field_type: &FieldType, reason: String) -> EngineError {
    EngineError::TypeCoercion {
        value: raw.to_string(),
        expected: field_type.to_string(),
        reason,
    }
}

// -- Default converters --

fn parse_float(s: &str) -> std::result::Result<Value, String> {
    s.parse::<f64>().map(Value::Float).map_err(|e| e.to_string())
}

fn parse_boolean(s: &str) -> std::result::Result<Value, String> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(Value::Boolean(true)),
        "false" | "no" | "0" => Ok(Value::Boolean(false)),
        _ => Err("expected true/false, yes/no or 1/0".to_string()),
    }
}

fn parse_date(s: &str) -> std::result::Result<Value, String> {
    DATE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDate::parse_from_str(s, layout).ok())
        .map(Value::Date)
        .ok_or_else(|| format!("expected one of {}", DATE_LAYOUTS.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_literal_matches_stored_integer() {
        let conv = Converters::default();
        assert_eq!(
            conv.coerce_str("34471", &FieldType::Integer).unwrap(),
            Value::Integer(34471)
        );
        assert_eq!(
            conv.coerce(&Value::from("34471"), &FieldType::Integer).unwrap(),
            Value::Integer(34471)
        );
    }

    #[test]
    fn non_numeric_integer_fails() {
        let conv = Converters::default();
        for raw in ["abc", "", "12.5", "1 2"] {
            let err = conv.coerce_str(raw, &FieldType::Integer).unwrap_err();
            assert!(matches!(err, EngineError::TypeCoercion { .. }), "{raw}");
        }
    }

    #[test]
    fn strings_are_trimmed() {
        let conv = Converters::default();
        assert_eq!(
            conv.coerce_str("  Jackson ", &FieldType::String).unwrap(),
            Value::from("Jackson")
        );
        assert_eq!(
            conv.coerce(&Value::Integer(7), &FieldType::String).unwrap(),
            Value::from("7")
        );
    }

    #[test]
    fn dates_accept_several_layouts() {
        let conv = Converters::default();
        let expected = Value::Date(NaiveDate::from_ymd_opt(2021, 3, 14).unwrap());
        for raw in ["2021-03-14", "2021/03/14", "03/14/2021"] {
            assert_eq!(conv.coerce_str(raw, &FieldType::Date).unwrap(), expected);
        }
        assert!(conv.coerce_str("14th March", &FieldType::Date).is_err());
    }

    #[test]
    fn unknown_type_is_a_configuration_error() {
        let conv = Converters::default();
        let sku = FieldType::Custom("sku".into());
        assert!(!conv.supports(&sku));
        assert!(matches!(
            conv.coerce_str("A-1", &sku),
            Err(EngineError::Configuration(_))
        ));

        let bare = Converters::empty();
        assert!(matches!(
            bare.coerce_str("2021-01-01", &FieldType::Date),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn custom_converters_plug_in() {
        fn sku(s: &str) -> std::result::Result<Value, String> {
            s.strip_prefix("SKU-")
                .map(|rest| Value::String(rest.to_ascii_uppercase()))
                .ok_or_else(|| "missing SKU- prefix".to_string())
        }

        let mut conv = Converters::default();
        conv.register("sku", sku);
        let ty = FieldType::Custom("sku".into());
        assert_eq!(conv.coerce_str("SKU-ab", &ty).unwrap(), Value::from("AB"));
        assert!(conv.coerce_str("ab", &ty).is_err());
    }

    #[test]
    fn cross_type_values() {
        let conv = Converters::default();
        assert_eq!(
            conv.coerce(&Value::Integer(2), &FieldType::Float).unwrap(),
            Value::Float(2.0)
        );
        assert!(conv.coerce(&Value::Float(2.5), &FieldType::Integer).is_err());
        assert_eq!(
            conv.coerce_str("Yes", &FieldType::Boolean).unwrap(),
            Value::Boolean(true)
        );
    }
}
