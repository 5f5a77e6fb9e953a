//! CSV audit log: one row per persisted batch.

use crate::batch::BatchSink;
use crate::types::Batch;
use crate::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

pub const TIMESTAMP_FORMAT: &str = "%m-%d-%Y %H:%M";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRow {
    pub batch_number: usize,
    pub total_succeeded: usize,
    pub total_failed: usize,
    pub label: String,
    pub timestamp: String,
}

impl AuditRow {
    pub fn for_batch(batch: &Batch, label: &str) -> Self {
        Self {
            batch_number: batch.index,
            total_succeeded: batch.success_count(),
            total_failed: batch.failure_count(),
            label: label.to_string(),
            timestamp: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

/// Appends success/failure counts per batch to a CSV file.
///
/// The header row is written only when the file is new or empty, so one log
/// can accumulate rows across runs.
#[derive(Debug, Clone)]
pub struct CsvAuditLog {
    path: PathBuf,
    label: String,
}

impl CsvAuditLog {
    pub fn new(path: impl Into<PathBuf>, label: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            label: label.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row. The row is encoded in memory and written with a single
    /// async append.
    pub async fn append(&self, row: &AuditRow) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let needs_header = file.metadata().await?.len() == 0;

        let bytes = encode_row(row, needs_header)?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        Ok(())
    }
}

fn encode_row(row: &AuditRow, with_header: bool) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(with_header)
        .from_writer(Vec::new());
    writer.serialize(row)?;
    writer.into_inner().map_err(|e| e.into_error().into())
}

#[async_trait]
impl BatchSink for CsvAuditLog {
    async fn accept(&mut self, batch: &Batch) -> Result<()> {
        let row = AuditRow::for_batch(batch, &self.label);
        debug!(path = %self.path.display(), batch = row.batch_number, "Appending audit row");
        self.append(&row).await
    }
}
