use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Datelike;

use super::model::{Record, Value};

/// Computes a pseudo field from the non-pseudo values of a record.
/// Returning `None` aborts ingestion of the batch.
pub type PseudoFn = Arc<dyn Fn(&Record) -> Option<Value> + Send + Sync>;

// ---------------------------------------------------------------------------
// PseudoFunctions – keyed compute functions
// ---------------------------------------------------------------------------

/// Compute functions registered by key.  Field definitions only carry the
/// key, so they stay plain data.
#[derive(Clone, Default)]
pub struct PseudoFunctions {
    table: BTreeMap<String, PseudoFn>,
}

impl std::fmt::Debug for PseudoFunctions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.table.keys()).finish()
    }
}

impl PseudoFunctions {
    pub fn register<F>(&mut self, key: impl Into<String>, f: F)
    where
        F: Fn(&Record) -> Option<Value> + Send + Sync + 'static,
    {
        self.table.insert(key.into(), Arc::new(f));
    }

    pub fn get(&self, key: &str) -> Option<&PseudoFn> {
        self.table.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.table.contains_key(key)
    }

    /// Whether `key` is registered or names a builtin.  Registers nothing.
    pub fn resolves(&self, key: &str) -> bool {
        self.contains(key) || builtin(key).is_some()
    }

    /// Make sure `key` is available, registering a builtin for it if needed.
    /// Returns `false` when the key is neither registered nor a builtin.
    pub fn ensure(&mut self, key: &str) -> bool {
        if self.contains(key) {
            return true;
        }
        match builtin(key) {
            Some(f) => {
                log::debug!("registering builtin pseudo function '{key}'");
                self.table.insert(key.to_string(), f);
                true
            }
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Builtins, addressable from configuration files
// ---------------------------------------------------------------------------

/// Resolve a builtin function key of the form `name:args`.
///
/// * `increment:<field>` – integer value + 1
/// * `upper:<field>` / `lower:<field>` – case-folded string
/// * `year:<field>` – year of a date
/// * `concat:<a>,<b>,...` – display forms joined with a space
pub fn builtin(key: &str) -> Option<PseudoFn> {
    let (name, args) = key.split_once(':')?;
    let args: Vec<String> = args
        .split(',')
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect();

    let f: PseudoFn = match (name, args.as_slice()) {
        ("increment", [field]) => {
            let field = field.clone();
            Arc::new(move |rec: &Record| {
                rec.get(&field)?.as_i64()?.checked_add(1).map(Value::Integer)
            })
        }
        ("upper", [field]) => {
            let field = field.clone();
            Arc::new(move |rec: &Record| {
                rec.get(&field).map(|v| Value::String(v.to_string().to_uppercase()))
            })
        }
        ("lower", [field]) => {
            let field = field.clone();
            Arc::new(move |rec: &Record| {
                rec.get(&field).map(|v| Value::String(v.to_string().to_lowercase()))
            })
        }
        ("year", [field]) => {
            let field = field.clone();
            Arc::new(move |rec: &Record| {
                rec.get(&field)?.as_date().map(|d| Value::Integer(i64::from(d.year())))
            })
        }
        ("concat", fields) if !fields.is_empty() => {
            let fields = fields.to_vec();
            Arc::new(move |rec: &Record| {
                let parts = fields
                    .iter()
                    .map(|f| rec.get(f).map(|v| v.to_string()))
                    .collect::<Option<Vec<_>>>()?;
                Some(Value::String(parts.join(" ")))
            })
        }
        _ => return None,
    };
    Some(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record() -> Record {
        let columns: Arc<[String]> = vec![
            "last_name".to_string(),
            "zip_code".to_string(),
            "joined".to_string(),
        ]
        .into();
        let mut rec = Record::empty(columns);
        rec.set_slot(0, Value::from("Jackson"));
        rec.set_slot(1, Value::Integer(34471));
        rec.set_slot(2, Value::Date(NaiveDate::from_ymd_opt(2019, 6, 1).unwrap()));
        rec
    }

    #[test]
    fn builtins_compute_from_record() {
        let rec = record();
        let call = |key: &str| builtin(key).expect(key)(&rec);

        assert_eq!(call("increment:zip_code"), Some(Value::Integer(34472)));
        assert_eq!(call("upper:last_name"), Some(Value::from("JACKSON")));
        assert_eq!(call("lower:last_name"), Some(Value::from("jackson")));
        assert_eq!(call("year:joined"), Some(Value::Integer(2019)));
        assert_eq!(call("concat:last_name,zip_code"), Some(Value::from("Jackson 34471")));
        assert_eq!(call("increment:last_name"), None);
    }

    #[test]
    fn unknown_builtins_are_rejected() {
        assert!(builtin("increment").is_none());
        assert!(builtin("explode:zip_code").is_none());
        assert!(builtin("increment:a,b").is_none());
    }

    #[test]
    fn ensure_registers_builtins_once() {
        let mut fns = PseudoFunctions::default();
        assert!(!fns.contains("increment:zip_code"));
        assert!(fns.ensure("increment:zip_code"));
        assert!(fns.contains("increment:zip_code"));
        assert!(!fns.ensure("nonsense"));
    }

    #[test]
    fn resolves_has_no_side_effects() {
        let fns = PseudoFunctions::default();
        assert!(fns.resolves("upper:last_name"));
        assert!(!fns.contains("upper:last_name"));
        assert!(!fns.resolves("nonsense"));
    }
}
