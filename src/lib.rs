//! In-memory record store with typed fields, derived pseudo fields, staged
//! equality filters and display projections.
//!
//! ```
//! use rusty_pivot::{Field, FieldType, Pivot};
//!
//! let mut pivot = Pivot::new();
//! pivot.register_pseudo("zip_plus_one", |rec: &rusty_pivot::Record| {
//!     rec.get("zip_code")?.as_i64().map(|z| (z + 1).into())
//! });
//! pivot
//!     .set_fields(vec![
//!         Field::new("last_name", FieldType::String).filterable(),
//!         Field::new("zip_code", FieldType::Integer).filterable(),
//!         Field::new("pseudo_zip", FieldType::Integer)
//!             .filterable()
//!             .computed_by("zip_plus_one"),
//!     ])
//!     .unwrap();
//! pivot
//!     .load_csv("last_name,zip_code\nJackson,34471\nSmith,34471")
//!     .unwrap();
//!
//! pivot.apply_filters_with([("zip_code", "34471")]).unwrap();
//! assert_eq!(pivot.result_len(), 2);
//! assert_eq!(pivot.values_for("pseudo_zip").unwrap().len(), 1);
//! ```

pub mod config;
pub mod data;
pub mod display;
pub mod error;
pub mod state;

pub use config::PivotConfig;
pub use data::coerce::Converters;
pub use data::field::{Field, FieldRegistry, FieldType};
pub use data::filter::{FilterPhase, FilterSelection};
pub use data::loader::Table;
pub use data::model::{Record, Value};
pub use data::tracker::ValueCounts;
pub use display::{DisplayRole, Projection};
pub use error::{EngineError, Result};
pub use state::Pivot;
