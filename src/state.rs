use crate::data::builder::RecordBuilder;
use crate::data::coerce::Converters;
use crate::data::field::{Field, FieldRegistry};
use crate::data::filter::{FilterEngine, FilterPhase, FilterSelection};
use crate::data::loader::{self, Table};
use crate::data::model::{Record, Value};
use crate::data::pseudo::PseudoFunctions;
use crate::data::tracker::{ValueCounts, ValueTracker};
use crate::display::{DisplayRole, DisplayRoles, Projection};
use crate::error::{EngineError, Result};

// ---------------------------------------------------------------------------
// Engine state
// ---------------------------------------------------------------------------

/// The whole engine: field registry, raw records, pseudo value index,
/// filter selection with its result set, and display roles.
///
/// One explicitly owned instance; callers that need shared access wrap it
/// themselves.  Pseudo functions and converters are engine configuration
/// and survive [`Pivot::reset`].
#[derive(Debug, Default)]
pub struct Pivot {
    registry: FieldRegistry,
    converters: Converters,
    functions: PseudoFunctions,

    /// Every ingested record, in row order.
    raw: Vec<Record>,

    /// Value distribution of filterable pseudo fields.
    values: ValueTracker,

    filters: FilterEngine,
    display: DisplayRoles,
}

impl Pivot {
    pub fn new() -> Self {
        Self::default()
    }

    // -- configuration --

    /// Register a compute function that pseudo fields can refer to by key.
    pub fn register_pseudo<F>(&mut self, key: impl Into<String>, f: F)
    where
        F: Fn(&Record) -> Option<Value> + Send + Sync + 'static,
    {
        self.functions.register(key, f);
    }

    pub fn converters_mut(&mut self) -> &mut Converters {
        &mut self.converters
    }

    // -- fields --

    /// Replace every field definition.
    pub fn set_fields(&mut self, fields: Vec<Field>) -> Result<()> {
        for field in &fields {
            self.check_field(field)?;
        }
        self.registry.set_fields(fields)?;
        self.register_builtins();
        log::debug!("fields set: {:?}", self.registry.names().collect::<Vec<_>>());
        Ok(())
    }

    pub fn add_field(&mut self, field: Field) -> Result<()> {
        self.check_field(&field)?;
        self.registry.add_field(field)?;
        self.register_builtins();
        Ok(())
    }

    /// Types need a converter, pseudo keys a registered (or builtin) function.
    /// Only validates; builtins are registered once the registry accepted
    /// the fields.
    fn check_field(&self, field: &Field) -> Result<()> {
        if !self.converters.supports(&field.field_type) {
            return Err(EngineError::config(format!(
                "field '{}' has unknown type '{}'",
                field.name, field.field_type
            )));
        }
        if let Some(key) = &field.pseudo {
            if !self.functions.resolves(key) {
                return Err(EngineError::config(format!(
                    "pseudo field '{}' refers to unknown function '{key}'",
                    field.name
                )));
            }
        }
        Ok(())
    }

    fn register_builtins(&mut self) {
        for field in self.registry.pseudo_fields() {
            if let Some(key) = &field.pseudo {
                self.functions.ensure(key);
            }
        }
    }

    pub fn field(&self, name: &str) -> Result<&Field> {
        self.registry.get(name)
    }

    pub fn fields(&self) -> &[Field] {
        self.registry.fields()
    }

    pub fn pseudo_fields(&self) -> impl Iterator<Item = &Field> {
        self.registry.pseudo_fields()
    }

    // -- ingestion --

    /// Rebuild the raw records from tokenized rows.
    ///
    /// On error nothing changes.  On success the previous records, value
    /// index and result set are discarded; the filter selection stays staged
    /// for the next apply.
    pub fn build(&mut self, header: &[String], rows: &[Vec<String>]) -> Result<()> {
        let built = RecordBuilder::new(&self.registry, &self.converters, &self.functions)
            .build(header, rows);
        let output = match built {
            Ok(output) => output,
            Err(e) => {
                log::warn!("ingestion aborted, keeping {} previous records: {e}", self.raw.len());
                return Err(e);
            }
        };

        self.raw = output.records;
        self.values = output.values;
        self.filters.invalidate();
        log::info!(
            "ingested {} records with fields {:?}",
            self.raw.len(),
            self.registry.names().collect::<Vec<_>>()
        );
        Ok(())
    }

    pub fn load_table(&mut self, table: &Table) -> Result<()> {
        self.build(&table.header, &table.rows)
    }

    /// Tokenize CSV text (first line is the header) and build from it.
    pub fn load_csv(&mut self, text: &str) -> anyhow::Result<()> {
        let table = loader::parse_csv(text)?;
        self.load_table(&table)?;
        Ok(())
    }

    /// All ingested records.
    pub fn raw(&self) -> &[Record] {
        &self.raw
    }

    /// Records matching the selection at the last apply.
    pub fn results(&self) -> Vec<&Record> {
        self.filters.matched().iter().map(|&i| &self.raw[i]).collect()
    }

    pub fn result_len(&self) -> usize {
        self.filters.matched().len()
    }

    // -- filters --

    /// Replace the selection without recomputing results.
    pub fn set_filters<I, K, V>(&mut self, literals: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.filters.set(&self.registry, &self.converters, literals)
    }

    /// Merge into the selection without recomputing results.
    pub fn add_filters<I, K, V>(&mut self, literals: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.filters.add(&self.registry, &self.converters, literals)
    }

    /// Recompute results from the staged selection, including every `add`.
    pub fn apply_filters(&mut self) {
        self.filters.apply(&self.raw);
    }

    /// Replace the selection and recompute in one step.
    pub fn apply_filters_with<I, K, V>(&mut self, literals: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.filters
            .apply_with(&self.registry, &self.converters, &self.raw, literals)
    }

    pub fn remove_filter(&mut self, field: &str) {
        self.filters.remove(field);
    }

    pub fn filters(&self) -> &FilterSelection {
        self.filters.selection()
    }

    pub fn filter_phase(&self) -> FilterPhase {
        self.filters.phase()
    }

    // -- pseudo values --

    /// Observed value counts of a filterable pseudo field.
    pub fn values_for(&self, name: &str) -> Result<&ValueCounts> {
        let field = self.registry.get(name)?;
        if !field.is_pseudo() || !field.filterable {
            return Err(EngineError::NotFound {
                kind: "filterable pseudo field",
                name: name.to_string(),
            });
        }
        self.values.values_for(name)
    }

    // -- display --

    pub fn set_display<S: AsRef<str>>(&mut self, role: DisplayRole, names: &[S]) -> Result<()> {
        self.display.set(role, names, &self.registry)
    }

    pub fn display(&self, role: DisplayRole) -> &[String] {
        self.display.get(role)
    }

    /// Project the current result set for a role.
    pub fn project(&self, role: DisplayRole) -> Vec<Projection> {
        self.display
            .project(role, &self.registry, self.results())
    }

    /// Project every raw record for a role.
    pub fn project_raw(&self, role: DisplayRole) -> Vec<Projection> {
        self.display.project(role, &self.registry, &self.raw)
    }

    // -- lifecycle --

    /// Back to an empty engine: no fields, records, filters or display roles.
    pub fn reset(&mut self) {
        self.registry.clear();
        self.raw.clear();
        self.values.clear();
        self.filters.clear();
        self.display.clear();
        log::debug!("engine reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::field::FieldType;

    const SAMPLE: &str = "last_name,first_name,zip_code\n\
                          Jackson,Robert,34471\n\
                          Smith,Jon,34471\n\
                          Jackson,Jon,34474\n\
                          Jackson,Susan,34476\n\
                          Fornea,Chris,34474\n\
                          Fornea,Shelly,39401";

    fn people() -> Vec<Field> {
        vec![
            Field::new("last_name", FieldType::String).filterable(),
            Field::new("first_name", FieldType::String).filterable(),
            Field::new("zip_code", FieldType::Integer).filterable(),
        ]
    }

    fn pivot() -> Pivot {
        let mut pivot = Pivot::new();
        pivot.set_fields(people()).unwrap();
        pivot.load_csv(SAMPLE).unwrap();
        pivot
    }

    #[test]
    fn failed_ingestion_keeps_previous_records() {
        let mut pivot = pivot();
        pivot.apply_filters_with([("last_name", "Jackson")]).unwrap();

        let err = pivot.load_csv("last_name,first_name,zip_code\nBrown,Al,notazip");
        assert!(err.is_err());
        assert_eq!(pivot.raw().len(), 6);
        assert_eq!(pivot.result_len(), 3);
        assert_eq!(pivot.filter_phase(), FilterPhase::Applied);
    }

    #[test]
    fn reingestion_invalidates_results_but_keeps_selection() {
        let mut pivot = pivot();
        pivot.apply_filters_with([("last_name", "Jackson")]).unwrap();
        pivot.load_csv(SAMPLE).unwrap();

        assert_eq!(pivot.result_len(), 0);
        assert_eq!(pivot.filter_phase(), FilterPhase::Staged);
        pivot.apply_filters();
        assert_eq!(pivot.result_len(), 3);
    }

    #[test]
    fn unknown_pseudo_key_or_type_is_rejected() {
        let mut pivot = Pivot::new();
        let err = pivot.add_field(Field::new("p", FieldType::Integer).computed_by("mystery"));
        assert!(matches!(err, Err(EngineError::Configuration(_))));

        let err = pivot.add_field(Field::new("code", FieldType::Custom("sku".into())));
        assert!(matches!(err, Err(EngineError::Configuration(_))));
        assert!(pivot.fields().is_empty());
    }

    #[test]
    fn rejected_field_list_registers_no_builtins() {
        let mut pivot = Pivot::new();
        let err = pivot.set_fields(vec![
            Field::new("zip_code", FieldType::Integer),
            Field::new("pseudo_zip", FieldType::Integer).computed_by("increment:zip_code"),
            Field::new("zip_code", FieldType::Integer),
        ]);
        assert!(matches!(err, Err(EngineError::Configuration(_))));
        assert!(!pivot.functions.contains("increment:zip_code"));

        let err = pivot.add_field(Field::new("shout", FieldType::Custom("sku".into())));
        assert!(err.is_err());
        pivot
            .add_field(Field::new("shout", FieldType::String).computed_by("upper:name"))
            .unwrap();
        assert!(pivot.functions.contains("upper:name"));
    }

    #[test]
    fn values_for_requires_filterable_pseudo_field() {
        let mut pivot = pivot();
        assert!(matches!(
            pivot.values_for("zip_code"),
            Err(EngineError::NotFound { .. })
        ));
        assert!(matches!(
            pivot.values_for("nope"),
            Err(EngineError::NotFound { .. })
        ));

        pivot
            .add_field(Field::new("shout", FieldType::String).computed_by("upper:last_name"))
            .unwrap();
        assert!(pivot.values_for("shout").is_err());
    }

    #[test]
    fn reset_returns_to_idle() {
        let mut pivot = pivot();
        pivot.apply_filters_with([("last_name", "Jackson")]).unwrap();
        pivot.set_display(DisplayRole::Label, &["last_name"]).unwrap();
        pivot.reset();

        assert!(pivot.fields().is_empty());
        assert!(pivot.raw().is_empty());
        assert!(pivot.filters().is_empty());
        assert!(pivot.display(DisplayRole::Label).is_empty());
        assert_eq!(pivot.filter_phase(), FilterPhase::Idle);
        assert_eq!(pivot.result_len(), 0);
    }
}
