//! A completed chunk of records.

use super::record::ResultRecord;

/// Records produced by one chunk, one per item that entered it.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Zero-based chunk index.
    pub index: usize,
    pub records: Vec<ResultRecord>,
}

impl Batch {
    pub fn new(index: usize, records: Vec<ResultRecord>) -> Self {
        Self { index, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.len() - self.success_count()
    }

    pub fn last(&self) -> Option<&ResultRecord> {
        self.records.last()
    }
}
