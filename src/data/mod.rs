//! Data layer: field schema, coercion, record building and filtering.
//!
//! Architecture:
//! ```text
//!  .csv / .json / .parquet
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  tokenize → Table (header + string cells)
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐   field   ┌──────────┐
//!   │ builder   │ ◄──────── │  coerce   │  text → typed Value
//!   └──────────┘  registry └──────────┘
//!        │   pseudo fns
//!        ▼
//!   raw Vec<Record> + tracker (pseudo value counts)
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  filter   │  staged equality predicates → matched indices
//!   └──────────┘
//! ```

pub mod builder;
pub mod coerce;
pub mod field;
pub mod filter;
pub mod loader;
pub mod model;
pub mod pseudo;
pub mod tracker;
