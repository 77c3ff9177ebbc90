use std::sync::Arc;

use super::coerce::Converters;
use super::field::{Field, FieldRegistry};
use super::model::Record;
use super::pseudo::{PseudoFn, PseudoFunctions};
use super::tracker::ValueTracker;
use crate::error::{EngineError, Result};

/// Where the value of one schema slot comes from.
enum Source<'a> {
    Column(usize),
    Computed(&'a PseudoFn),
}

/// Raw records plus the pseudo value index gathered while building them.
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    pub records: Vec<Record>,
    pub values: ValueTracker,
}

// ---------------------------------------------------------------------------
// RecordBuilder – tokenized rows → typed records
// ---------------------------------------------------------------------------

/// Turns tokenized rows into typed records for the current field registry.
///
/// The output is built on fresh buffers: an error anywhere in the batch
/// returns before anything is handed back, so callers keep their previous
/// record set untouched.
pub struct RecordBuilder<'a> {
    registry: &'a FieldRegistry,
    converters: &'a Converters,
    functions: &'a PseudoFunctions,
}

impl<'a> RecordBuilder<'a> {
    pub fn new(
        registry: &'a FieldRegistry,
        converters: &'a Converters,
        functions: &'a PseudoFunctions,
    ) -> Self {
        RecordBuilder {
            registry,
            converters,
            functions,
        }
    }

    /// Build one record per row, in row order.
    ///
    /// Non-pseudo fields are matched to header columns by name; header
    /// columns without a field are ignored.  Pseudo functions see the record
    /// with only its non-pseudo slots filled.
    pub fn build(&self, header: &[String], rows: &[Vec<String>]) -> Result<BuildOutput> {
        let fields = self.registry.fields();
        let sources = self.plan(header)?;
        let columns: Arc<[String]> = self.registry.names().map(str::to_string).collect();

        for extra in header.iter().filter(|h| self.registry.position(h).is_none()) {
            log::debug!("ignoring header column '{extra}' with no field definition");
        }

        let mut values = ValueTracker::for_fields(
            self.registry
                .pseudo_fields()
                .filter(|f| f.filterable)
                .map(|f| f.name.as_str()),
        );
        let mut records = Vec::with_capacity(rows.len());

        for (i, row) in rows.iter().enumerate() {
            let row_no = i + 1;
            if row.len() != header.len() {
                return Err(EngineError::MalformedRow {
                    row: row_no,
                    expected: header.len(),
                    found: row.len(),
                });
            }

            let mut record = Record::empty(Arc::clone(&columns));
            for (slot, (field, source)) in fields.iter().zip(&sources).enumerate() {
                if let Source::Column(col) = source {
                    let value = self.converters.coerce_str(&row[*col], &field.field_type)?;
                    record.set_slot(slot, value);
                }
            }

            // Evaluate every pseudo field against the same partial record
            // before filling any pseudo slot.
            let mut computed = Vec::new();
            for (slot, (field, source)) in fields.iter().zip(&sources).enumerate() {
                if let Source::Computed(f) = source {
                    let raw = f(&record).ok_or_else(|| EngineError::PseudoField {
                        field: field.name.clone(),
                        row: row_no,
                    })?;
                    let value = self.converters.coerce(&raw, &field.field_type)?;
                    if field.filterable {
                        values.observe(&field.name, &value);
                    }
                    computed.push((slot, value));
                }
            }
            for (slot, value) in computed {
                record.set_slot(slot, value);
            }

            records.push(record);
        }

        Ok(BuildOutput { records, values })
    }

    fn plan(&self, header: &[String]) -> Result<Vec<Source<'a>>> {
        self.registry
            .fields()
            .iter()
            .map(|field| self.source_for(field, header))
            .collect()
    }

    fn source_for(&self, field: &Field, header: &[String]) -> Result<Source<'a>> {
        if !self.converters.supports(&field.field_type) {
            return Err(EngineError::config(format!(
                "field '{}' has unknown type '{}'",
                field.name, field.field_type
            )));
        }
        match &field.pseudo {
            Some(key) => self.functions.get(key).map(Source::Computed).ok_or_else(|| {
                EngineError::config(format!(
                    "pseudo field '{}' refers to unregistered function '{key}'",
                    field.name
                ))
            }),
            None => header
                .iter()
                .position(|h| *h == field.name)
                .map(Source::Column)
                .ok_or_else(|| {
                    EngineError::config(format!("field '{}' is missing from the header", field.name))
                }),
        }
    }
}
