use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array};
use arrow::datatypes::DataType;
use arrow::util::display::array_value_to_string;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

// ---------------------------------------------------------------------------
// Table – tokenized input, all cells still text
// ---------------------------------------------------------------------------

/// Header names plus rows of string cells, ready for the record builder.
/// Rows are not checked against the header width here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Tokenize a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header line followed by comma-separated rows
/// * `.json`    – `[{ "last_name": "Jackson", "zip_code": 34471 }, ...]`
/// * `.parquet` – any flat schema; every column becomes text
pub fn load_file(path: &Path) -> Result<Table> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "csv" => {
            let file = std::fs::File::open(path).context("opening CSV")?;
            read_csv(file)?
        }
        "json" => load_json(path)?,
        "parquet" | "pq" => load_parquet(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };
    log::info!(
        "Tokenized {} rows with columns {:?} from {}",
        table.len(),
        table.header,
        path.display()
    );
    Ok(table)
}

/// Tokenize CSV text whose first line holds the header names.
pub fn parse_csv(text: &str) -> Result<Table> {
    read_csv(text.as_bytes())
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// Short or long rows are passed through as they are, so the record
/// builder can report them with their row number.
fn read_csv<R: Read>(input: R) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    let header: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {}", row_no + 1))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(Table { header, rows })
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

/// Records-oriented JSON (`df.to_json(orient='records')`).  The header is
/// the union of keys in first-seen order; a key missing from an object, or
/// `null`, is an empty cell.
fn load_json(path: &Path) -> Result<Table> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    parse_json(&text)
}

pub fn parse_json(text: &str) -> Result<Table> {
    let root: JsonValue = serde_json::from_str(text).context("parsing JSON")?;
    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut header: Vec<String> = Vec::new();
    let mut objects = Vec::with_capacity(records.len());
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {} is not a JSON object", i + 1))?;
        for key in obj.keys() {
            if !header.contains(key) {
                header.push(key.clone());
            }
        }
        objects.push(obj);
    }

    let rows = objects
        .iter()
        .map(|obj| {
            header
                .iter()
                .map(|key| obj.get(key).map(json_to_cell).unwrap_or_default())
                .collect()
        })
        .collect();

    Ok(Table { header, rows })
}

fn json_to_cell(val: &JsonValue) -> String {
    match val {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).  Nulls become empty cells.
fn load_parquet(path: &Path) -> Result<Table> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let header: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for row in 0..batch.num_rows() {
            let cells = batch
                .columns()
                .iter()
                .map(|col| cell_text(col, row))
                .collect::<Result<Vec<_>>>()
                .with_context(|| format!("Row {}", rows.len() + 1))?;
            rows.push(cells);
        }
    }

    Ok(Table { header, rows })
}

/// Render a single Arrow cell as text.
fn cell_text(col: &Arc<dyn Array>, row: usize) -> Result<String> {
    if col.is_null(row) {
        return Ok(String::new());
    }
    let text = match col.data_type() {
        DataType::Utf8 => col.as_string::<i32>().value(row).to_string(),
        DataType::LargeUtf8 => col.as_string::<i64>().value(row).to_string(),
        DataType::Int32 => col
            .as_any()
            .downcast_ref::<Int32Array>()
            .context("expected Int32Array")?
            .value(row)
            .to_string(),
        DataType::Int64 => col
            .as_any()
            .downcast_ref::<Int64Array>()
            .context("expected Int64Array")?
            .value(row)
            .to_string(),
        DataType::Float32 => col
            .as_any()
            .downcast_ref::<Float32Array>()
            .context("expected Float32Array")?
            .value(row)
            .to_string(),
        DataType::Float64 => col
            .as_any()
            .downcast_ref::<Float64Array>()
            .context("expected Float64Array")?
            .value(row)
            .to_string(),
        DataType::Boolean => col
            .as_any()
            .downcast_ref::<BooleanArray>()
            .context("expected BooleanArray")?
            .value(row)
            .to_string(),
        // Dates, timestamps and the rest use Arrow's own formatting.
        _ => array_value_to_string(col.as_ref(), row)
            .with_context(|| format!("formatting {:?} value", col.data_type()))?,
    };
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_text_splits_header_and_rows() {
        let table = parse_csv("last_name,first_name,zip_code\nJackson,Robert,34471\nSmith,Jon,34471")
            .unwrap();
        assert_eq!(table.header, ["last_name", "first_name", "zip_code"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[1], ["Smith", "Jon", "34471"]);
    }

    #[test]
    fn ragged_csv_rows_pass_through() {
        let table = parse_csv("a,b\n1,2\n3\n").unwrap();
        assert_eq!(table.rows[1], ["3"]);
    }

    #[test]
    fn json_records_union_keys() {
        let table = parse_json(
            r#"[{"last_name": "Jackson", "zip_code": 34471},
                {"last_name": "Smith", "first_name": null}]"#,
        )
        .unwrap();
        assert_eq!(table.header.len(), 3);
        let zip = table.header.iter().position(|h| h == "zip_code").unwrap();
        assert_eq!(table.rows[0][zip], "34471");
        assert_eq!(table.rows[1][zip], "");
    }

    #[test]
    fn non_array_json_is_rejected() {
        assert!(parse_json(r#"{"last_name": "Jackson"}"#).is_err());
    }

    #[test]
    fn unknown_extension_is_rejected() {
        assert!(load_file(Path::new("people.xlsx")).is_err());
    }
}
