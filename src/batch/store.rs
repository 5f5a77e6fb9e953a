//! On-disk batch files.

use crate::types::Batch;
use crate::Result;
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes each batch as a JSON array to `<dir>/results_batch-<index>.json`.
#[derive(Debug, Clone)]
pub struct BatchStore {
    dir: PathBuf,
}

impl BatchStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, index: usize) -> PathBuf {
        self.dir.join(format!("results_batch-{}.json", index))
    }

    /// Persist a batch, replacing any previous file for the same index.
    ///
    /// Written to a temporary sibling first and renamed into place.
    pub async fn persist(&self, batch: &Batch) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(batch.index);
        let tmp = self.dir.join(format!(".results_batch-{}.json.tmp", batch.index));

        let bytes = serde_json::to_vec(&batch.records)?;
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        info!(batch = batch.index, path = %path.display(), records = batch.len(), "Saved batch to disk");
        Ok(path)
    }
}
