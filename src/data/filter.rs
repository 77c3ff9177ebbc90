use std::collections::BTreeMap;

use super::coerce::Converters;
use super::field::FieldRegistry;
use super::model::{Record, Value};
use crate::error::{EngineError, Result};

// ---------------------------------------------------------------------------
// Filter selection: one typed "equals" predicate per field, ANDed
// ---------------------------------------------------------------------------

/// Active predicates: field name → value the field must equal.  Values are
/// always stored coerced to the field's declared type.
pub type FilterSelection = BTreeMap<String, Value>;

/// Where the filter engine stands relative to its last recompute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterPhase {
    /// No selection and nothing matched.
    #[default]
    Idle,
    /// Selection changed since the result set was last computed.
    Staged,
    /// Result set reflects the current selection.
    Applied,
}

/// Coerce caller-supplied literals against the registry.
///
/// Unknown fields are `NotFound`; fields not marked filterable are refused
/// as a configuration error.  Nothing is returned unless every pair coerces.
pub fn coerce_selection<I, K, V>(
    registry: &FieldRegistry,
    converters: &Converters,
    literals: I,
) -> Result<FilterSelection>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<Value>,
{
    let mut selection = FilterSelection::new();
    for (name, literal) in literals {
        let field = registry.get(name.as_ref())?;
        if !field.filterable {
            return Err(EngineError::config(format!(
                "field '{}' is not filterable",
                field.name
            )));
        }
        let value = converters.coerce(&literal.into(), &field.field_type)?;
        selection.insert(field.name.clone(), value);
    }
    Ok(selection)
}

/// Return indices of records that satisfy every predicate.
///
/// An empty selection matches nothing: results only exist after a filter
/// has been applied.  A predicate on a field the records were not built
/// with matches nothing either.
pub fn matching_indices(records: &[Record], selection: &FilterSelection) -> Vec<usize> {
    if selection.is_empty() {
        return Vec::new();
    }
    let Some(first) = records.first() else {
        return Vec::new();
    };

    // All records of one build share a schema, so resolve slots once.
    let mut predicates = Vec::with_capacity(selection.len());
    for (name, value) in selection {
        match first.position(name) {
            Some(slot) => predicates.push((slot, value)),
            None => return Vec::new(),
        }
    }

    records
        .iter()
        .enumerate()
        .filter(|(_, rec)| {
            predicates
                .iter()
                .all(|(slot, value)| rec.get_index(*slot) == Some(*value))
        })
        .map(|(i, _)| i)
        .collect()
}

// ---------------------------------------------------------------------------
// FilterEngine – staged selection and the result set it produced
// ---------------------------------------------------------------------------

/// Holds the filter selection and the indices of the records that matched
/// it at the last apply.
///
/// `set` and `add` only stage a change; the result set moves only on
/// `apply` / `apply_with`.  Every fallible call coerces first and mutates
/// afterwards, so an error leaves selection, results and phase as they were.
#[derive(Debug, Clone, Default)]
pub struct FilterEngine {
    selection: FilterSelection,
    matched: Vec<usize>,
    phase: FilterPhase,
}

impl FilterEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole selection.  Does not recompute.
    pub fn set<I, K, V>(
        &mut self,
        registry: &FieldRegistry,
        converters: &Converters,
        literals: I,
    ) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.selection = coerce_selection(registry, converters, literals)?;
        self.phase = FilterPhase::Staged;
        log::debug!("filters staged (set): {:?}", self.selection);
        Ok(())
    }

    /// Merge into the selection, overwriting fields already present.
    /// Does not recompute.
    pub fn add<I, K, V>(
        &mut self,
        registry: &FieldRegistry,
        converters: &Converters,
        literals: I,
    ) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let extra = coerce_selection(registry, converters, literals)?;
        self.selection.extend(extra);
        self.phase = FilterPhase::Staged;
        log::debug!("filters staged (add): {:?}", self.selection);
        Ok(())
    }

    /// Drop one predicate.  Unknown names are ignored.
    pub fn remove(&mut self, field: &str) {
        if self.selection.remove(field).is_some() {
            self.phase = FilterPhase::Staged;
        }
    }

    /// Recompute the result set from the staged selection, scanning every
    /// raw record.
    pub fn apply(&mut self, records: &[Record]) {
        self.matched = matching_indices(records, &self.selection);
        self.phase = FilterPhase::Applied;
        log::debug!(
            "filters applied: {} of {} records match {:?}",
            self.matched.len(),
            records.len(),
            self.selection
        );
    }

    /// Replace the selection and recompute.  Predicates staged with `add`
    /// are discarded.
    pub fn apply_with<I, K, V>(
        &mut self,
        registry: &FieldRegistry,
        converters: &Converters,
        records: &[Record],
        literals: I,
    ) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.set(registry, converters, literals)?;
        self.apply(records);
        Ok(())
    }

    /// Forget the result set after the raw records changed underneath it.
    /// The selection survives and waits for the next apply.
    pub fn invalidate(&mut self) {
        self.matched.clear();
        self.phase = if self.selection.is_empty() {
            FilterPhase::Idle
        } else {
            FilterPhase::Staged
        };
    }

    pub fn clear(&mut self) {
        self.selection.clear();
        self.matched.clear();
        self.phase = FilterPhase::Idle;
    }

    pub fn selection(&self) -> &FilterSelection {
        &self.selection
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.selection.get(field)
    }

    /// Indices into the raw records that matched at the last apply.
    pub fn matched(&self) -> &[usize] {
        &self.matched
    }

    pub fn phase(&self) -> FilterPhase {
        self.phase
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::builder::RecordBuilder;
    use crate::data::field::{Field, FieldType};
    use crate::data::pseudo::PseudoFunctions;

    fn setup() -> (FieldRegistry, Converters, Vec<Record>) {
        let mut reg = FieldRegistry::new();
        reg.set_fields(vec![
            Field::new("last_name", FieldType::String).filterable(),
            Field::new("first_name", FieldType::String).filterable(),
            Field::new("zip_code", FieldType::Integer).filterable(),
            Field::new("note", FieldType::String),
        ])
        .unwrap();
        let header = ["last_name", "first_name", "zip_code", "note"]
            .map(String::from)
            .to_vec();
        let rows: Vec<Vec<String>> = [
            ["Jackson", "Robert", "34471", ""],
            ["Smith", "Jon", "34471", ""],
            ["Jackson", "Jon", "34474", ""],
            ["Jackson", "Susan", "34476", ""],
            ["Fornea", "Chris", "34474", ""],
            ["Fornea", "Shelly", "39401", ""],
        ]
        .iter()
        .map(|r| r.map(String::from).to_vec())
        .collect();
        let conv = Converters::default();
        let fns = PseudoFunctions::default();
        let records = RecordBuilder::new(&reg, &conv, &fns)
            .build(&header, &rows)
            .unwrap()
            .records;
        (reg, conv, records)
    }

    #[test]
    fn set_stages_without_recompute() {
        let (reg, conv, records) = setup();
        let mut filters = FilterEngine::new();
        assert_eq!(filters.phase(), FilterPhase::Idle);

        filters.set(&reg, &conv, [("last_name", "Jackson")]).unwrap();
        assert_eq!(filters.phase(), FilterPhase::Staged);
        assert!(filters.matched().is_empty());

        filters.apply(&records);
        assert_eq!(filters.phase(), FilterPhase::Applied);
        assert_eq!(filters.matched(), &[0, 2, 3]);
    }

    #[test]
    fn literals_are_coerced_to_field_type() {
        let (reg, conv, _) = setup();
        let mut filters = FilterEngine::new();
        filters.set(&reg, &conv, [("last_name", "Jackson")]).unwrap();
        filters.add(&reg, &conv, [("zip_code", "34471")]).unwrap();

        assert_eq!(filters.get("zip_code"), Some(&Value::Integer(34471)));
        assert_eq!(filters.selection().len(), 2);
    }

    #[test]
    fn add_narrows_and_apply_with_resets() {
        let (reg, conv, records) = setup();
        let mut filters = FilterEngine::new();

        filters
            .apply_with(&reg, &conv, &records, [("last_name", "Jackson")])
            .unwrap();
        assert_eq!(filters.matched().len(), 3);

        filters.add(&reg, &conv, [("first_name", "Jon")]).unwrap();
        assert_eq!(filters.matched().len(), 3);
        filters.apply(&records);
        assert_eq!(filters.matched(), &[2]);

        filters
            .apply_with(&reg, &conv, &records, [("last_name", "Fornea")])
            .unwrap();
        assert_eq!(filters.matched(), &[4, 5]);
        assert_eq!(filters.get("first_name"), None);
    }

    #[test]
    fn empty_selection_matches_nothing() {
        let (_, _, records) = setup();
        let mut filters = FilterEngine::new();
        filters.apply(&records);
        assert!(filters.matched().is_empty());
        assert_eq!(filters.phase(), FilterPhase::Applied);
    }

    #[test]
    fn errors_leave_state_untouched() {
        let (reg, conv, records) = setup();
        let mut filters = FilterEngine::new();
        filters
            .apply_with(&reg, &conv, &records, [("last_name", "Jackson")])
            .unwrap();

        let err = filters.add(&reg, &conv, [("first_name", "Jon"), ("zip_code", "north")]);
        assert!(matches!(err, Err(EngineError::TypeCoercion { .. })));
        let err = filters.set(&reg, &conv, [("nickname", "Bob")]);
        assert!(matches!(err, Err(EngineError::NotFound { .. })));
        let err = filters.set(&reg, &conv, [("note", "")]);
        assert!(matches!(err, Err(EngineError::Configuration(_))));

        assert_eq!(filters.phase(), FilterPhase::Applied);
        assert_eq!(filters.selection().len(), 1);
        assert_eq!(filters.matched().len(), 3);
    }

    #[test]
    fn remove_and_invalidate() {
        let (reg, conv, records) = setup();
        let mut filters = FilterEngine::new();
        filters
            .apply_with(&reg, &conv, &records, [("last_name", "Jackson")])
            .unwrap();

        filters.remove("first_name");
        assert_eq!(filters.phase(), FilterPhase::Applied);

        filters.invalidate();
        assert_eq!(filters.phase(), FilterPhase::Staged);
        assert!(filters.matched().is_empty());

        filters.remove("last_name");
        filters.invalidate();
        assert_eq!(filters.phase(), FilterPhase::Idle);
    }
}
