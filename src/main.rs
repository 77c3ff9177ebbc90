use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use rusty_pivot::data::loader;
use rusty_pivot::{DisplayRole, Field, FieldType, Pivot, PivotConfig};

/// Load a table, filter it and print the matching records as JSON lines.
#[derive(Debug, Parser)]
#[command(name = "rusty-pivot", version, about)]
struct Cli {
    /// Input file (.csv, .json, .parquet)
    #[arg(short, long)]
    data: PathBuf,

    /// JSON config with field definitions, display roles and filters.
    /// Without it every header column becomes a filterable string field.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Replace the filter selection and apply it (repeatable, field=value)
    #[arg(short, long = "filter", value_parser = parse_pair)]
    filters: Vec<(String, String)>,

    /// Narrow the applied selection (repeatable, field=value)
    #[arg(short, long = "narrow", value_parser = parse_pair)]
    narrow: Vec<(String, String)>,

    /// What to print for each matching record
    #[arg(short, long, value_enum, default_value_t = Role::Records)]
    role: Role,

    /// Print the value counts of a filterable pseudo field instead
    #[arg(long)]
    values: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Role {
    /// Every ingested record, ignoring filters
    Raw,
    /// Full records of the result set
    Records,
    /// Result set projected onto the label role
    Label,
    /// Result set projected onto the summary role
    Summary,
}

fn parse_pair(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected field=value, got '{s}'"))
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let table = loader::load_file(&cli.data)
        .with_context(|| format!("loading {}", cli.data.display()))?;

    let mut pivot = Pivot::new();
    match &cli.config {
        Some(path) => PivotConfig::from_path(path)?.apply_to(&mut pivot)?,
        None => {
            let fields = table
                .header
                .iter()
                .map(|h| Field::new(h.clone(), FieldType::String).filterable())
                .collect();
            pivot.set_fields(fields)?;
        }
    }
    pivot.load_table(&table)?;

    if !cli.filters.is_empty() {
        pivot.apply_filters_with(cli.filters.iter().map(|(k, v)| (k, v.as_str())))?;
    } else {
        pivot.apply_filters();
    }
    if !cli.narrow.is_empty() {
        pivot.add_filters(cli.narrow.iter().map(|(k, v)| (k, v.as_str())))?;
        pivot.apply_filters();
    }
    log::info!(
        "{} of {} records match {:?}",
        pivot.result_len(),
        pivot.raw().len(),
        pivot.filters()
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    if let Some(field) = &cli.values {
        for (value, count) in pivot.values_for(field)? {
            writeln!(out, "{}", serde_json::json!({ "value": value, "count": count }))?;
        }
        return Ok(());
    }

    match cli.role {
        Role::Raw => {
            for rec in pivot.raw() {
                writeln!(out, "{}", serde_json::to_string(rec)?)?;
            }
        }
        Role::Records => {
            for rec in pivot.results() {
                writeln!(out, "{}", serde_json::to_string(rec)?)?;
            }
        }
        Role::Label | Role::Summary => {
            let role = if cli.role == Role::Label {
                DisplayRole::Label
            } else {
                DisplayRole::Summary
            };
            for row in pivot.project(role) {
                writeln!(out, "{}", serde_json::to_string(&row)?)?;
            }
        }
    }
    Ok(())
}
