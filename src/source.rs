//! Item sources: CSV reports and JSON arrays.
//!
//! Columns can be selected and renamed on the way in so that field names
//! match the URL template placeholders and parameter mapping. Rows can be
//! filtered on column values, after empty cells are filled from `defaults`.
//!
//! ```yaml
//! source:
//!   path: fines.csv
//!   defaults: { "Policy Name": Voyager }
//!   filter: { "Policy Name": [Voyager, Overdue] }
//!   columns: { "Fine Fee Id": fee_id }
//! ```

use crate::types::{scalar_text, Item};
use crate::{Error, ErrorContext, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Csv,
    Json,
}

impl SourceFormat {
    /// `.json` means JSON, anything else is read as CSV.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => SourceFormat::Json,
            _ => SourceFormat::Csv,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub format: Option<SourceFormat>,
    /// Source column → item field. Empty keeps every column under its own name.
    #[serde(default)]
    pub columns: BTreeMap<String, String>,
    /// Source column → value used when the cell is empty or null.
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
    /// Source column → allowed values. Rows with any other value are skipped.
    #[serde(default)]
    pub filter: BTreeMap<String, Vec<String>>,
}

impl SourceConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: None,
            columns: BTreeMap::new(),
            defaults: BTreeMap::new(),
            filter: BTreeMap::new(),
        }
    }

    pub fn with_column(mut self, column: impl Into<String>, field: impl Into<String>) -> Self {
        self.columns.insert(column.into(), field.into());
        self
    }

    pub fn with_default(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(column.into(), value.into());
        self
    }

    pub fn with_filter<I, V>(mut self, column: impl Into<String>, allowed: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.filter
            .insert(column.into(), allowed.into_iter().map(Into::into).collect());
        self
    }

    /// Columns every row must carry: selected and filtered ones.
    fn required_columns(&self) -> BTreeSet<&str> {
        self.columns
            .keys()
            .chain(self.filter.keys())
            .map(String::as_str)
            .collect()
    }

    pub fn format(&self) -> SourceFormat {
        self.format.unwrap_or_else(|| SourceFormat::from_path(&self.path))
    }

    /// Field names items will carry, when known without reading the file.
    pub fn output_fields(&self) -> Option<Vec<&str>> {
        (!self.columns.is_empty()).then(|| self.columns.values().map(String::as_str).collect())
    }
}

/// Load all items described by `cfg`.
pub fn load_items(cfg: &SourceConfig) -> Result<Vec<Item>> {
    let rows = match cfg.format() {
        SourceFormat::Csv => read_csv(cfg)?,
        SourceFormat::Json => read_json(cfg)?,
    };
    let total = rows.len();
    let items: Vec<Item> = rows.into_iter().filter_map(|row| shape(cfg, row)).collect();
    info!(
        path = %cfg.path.display(),
        items = items.len(),
        skipped = total - items.len(),
        "Loaded items"
    );
    Ok(items)
}

fn read_csv(cfg: &SourceConfig) -> Result<Vec<Item>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(&cfg.path)?;
    let headers = reader.headers()?.clone();

    let missing: Vec<&str> = cfg
        .required_columns()
        .into_iter()
        .filter(|c| !headers.iter().any(|h| h == *c))
        .collect();
    if !missing.is_empty() {
        return Err(missing_columns(cfg, &missing));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: Item = headers
            .iter()
            .zip(record.iter())
            .map(|(name, cell)| {
                let value = if cell.is_empty() {
                    Value::Null
                } else {
                    Value::String(cell.to_string())
                };
                (name, value)
            })
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

fn read_json(cfg: &SourceConfig) -> Result<Vec<Item>> {
    let file = File::open(&cfg.path)?;
    let rows: Vec<Item> = serde_json::from_reader(BufReader::new(file))?;

    let required = cfg.required_columns();
    for (idx, row) in rows.iter().enumerate() {
        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|c| !row.contains(c))
            .collect();
        if !missing.is_empty() {
            return Err(missing_columns(cfg, &missing).with_row(idx));
        }
    }
    Ok(rows)
}

/// Fill defaults, apply the filter, then select and rename columns.
fn shape(cfg: &SourceConfig, mut row: Item) -> Option<Item> {
    for (column, value) in &cfg.defaults {
        if row.get(column).map_or(true, Value::is_null) {
            row.insert(column.clone(), value.clone());
        }
    }

    let keep = cfg.filter.iter().all(|(column, allowed)| {
        row.get(column)
            .filter(|v| !v.is_null())
            .map(scalar_text)
            .is_some_and(|text| allowed.contains(&text))
    });
    if !keep {
        return None;
    }

    if cfg.columns.is_empty() {
        return Some(row);
    }
    Some(
        row.fields()
            .filter_map(|(name, value)| cfg.columns.get(name).map(|f| (f.clone(), value.clone())))
            .collect(),
    )
}

fn missing_columns(cfg: &SourceConfig, missing: &[&str]) -> Error {
    Error::validation_with_context(
        format!("source is missing columns: {}", missing.join(", ")),
        ErrorContext::new()
            .with_field_path("source.columns")
            .with_details(cfg.path.display().to_string())
            .with_source("item_source"),
    )
}

trait WithRow {
    fn with_row(self, row: usize) -> Self;
}

impl WithRow for Error {
    fn with_row(self, row: usize) -> Self {
        match self {
            Error::Validation { message, context } => Error::Validation {
                message: format!("{} (row {})", message, row),
                context,
            },
            other => other,
        }
    }
}
