use crate::models::{UploadRecord, UploadStatus};
use dashmap::DashMap;
use std::sync::Arc;

/// Shared map of in-flight uploads keyed by upload id.
///
/// Cloning yields another handle on the same map. Every operation locks
/// only the shard that holds the key, so unrelated uploads never contend
/// on a global lock.
#[derive(Debug, Clone, Default)]
pub struct ProgressRegistry {
    records: Arc<DashMap<String, UploadRecord>>,
}

impl ProgressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the record stored under `id`.
    pub fn put(&self, id: impl Into<String>, record: UploadRecord) {
        self.records.insert(id.into(), record);
    }

    /// Returns a copy of the record, taken under the shard lock.
    pub fn get(&self, id: &str) -> Option<UploadRecord> {
        self.records.get(id).map(|entry| entry.value().clone())
    }

    pub fn delete(&self, id: &str) -> Option<UploadRecord> {
        self.records.remove(id).map(|(_, record)| record)
    }

    /// Publishes the running byte count of a transfer.
    ///
    /// The stored value never decreases and never exceeds `total_size`.
    /// Returns `false` when the record is gone.
    pub fn advance(&self, id: &str, uploaded: u64) -> bool {
        match self.records.get_mut(id) {
            Some(mut entry) => {
                let record = entry.value_mut();
                let capped = uploaded.min(record.total_size);
                if capped > record.uploaded_size {
                    record.uploaded_size = capped;
                }
                true
            }
            None => false,
        }
    }

    pub fn mark_complete(&self, id: &str) {
        if let Some(mut entry) = self.records.get_mut(id) {
            entry.status = UploadStatus::Complete;
        }
    }

    pub fn mark_failed(&self, id: &str, reason: impl Into<String>) {
        if let Some(mut entry) = self.records.get_mut(id) {
            entry.status = UploadStatus::Failed;
            entry.error = Some(reason.into());
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
