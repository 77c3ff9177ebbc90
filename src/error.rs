use thiserror::Error;

// ---------------------------------------------------------------------------
// EngineError – everything the engine can refuse to do
// ---------------------------------------------------------------------------

/// Errors surfaced synchronously by engine operations.
///
/// A failed operation never leaves partial state behind: the registry,
/// raw records, filter selection and display roles keep whatever they held
/// before the call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Duplicate or unknown field, unknown type, unknown pseudo function.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A name referenced by a filter, display role or value lookup does not exist.
    #[error("{kind} not found: '{name}'")]
    NotFound { kind: &'static str, name: String },

    /// A value could not be converted to the declared field type.
    #[error("cannot coerce '{value}' to {expected}: {reason}")]
    TypeCoercion {
        value: String,
        expected: String,
        reason: String,
    },

    /// Row width does not match the header width.
    #[error("row {row}: expected {expected} cells, found {found}")]
    MalformedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// A pseudo function produced no value for a row.
    #[error("pseudo field '{field}' could not be computed for row {row}")]
    PseudoField { field: String, row: usize },
}

impl EngineError {
    pub fn config(msg: impl Into<String>) -> Self {
        EngineError::Configuration(msg.into())
    }

    pub fn field_not_found(name: &str) -> Self {
        EngineError::NotFound {
            kind: "field",
            name: name.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offender() {
        let err = EngineError::field_not_found("zip");
        assert_eq!(err.to_string(), "field not found: 'zip'");

        let err = EngineError::MalformedRow {
            row: 3,
            expected: 3,
            found: 2,
        };
        assert_eq!(err.to_string(), "row 3: expected 3 cells, found 2");
    }
}
