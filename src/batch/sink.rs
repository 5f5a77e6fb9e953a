//! Consumers of completed batches.

use crate::types::Batch;
use crate::Result;
use async_trait::async_trait;

/// Receives each batch after it has been persisted, before the next chunk starts.
#[async_trait]
pub trait BatchSink: Send {
    async fn accept(&mut self, batch: &Batch) -> Result<()>;
}

/// Keeps every batch in memory.
#[async_trait]
impl BatchSink for Vec<Batch> {
    async fn accept(&mut self, batch: &Batch) -> Result<()> {
        self.push(batch.clone());
        Ok(())
    }
}

/// Discards batches.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl BatchSink for NoopSink {
    async fn accept(&mut self, _batch: &Batch) -> Result<()> {
        Ok(())
    }
}
