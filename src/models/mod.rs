use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Terminal outcome of a background transfer, `Pending` while bytes still flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Complete,
    Failed,
}

/// Live progress of one upload, serialized as-is into progress events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    pub id: String,
    /// Name declared by the client. Not a trusted path.
    pub filename: String,
    pub total_size: u64,
    pub uploaded_size: u64,
    pub start_time: DateTime<Utc>,
    pub status: UploadStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadRecord {
    pub fn new(id: String, filename: String, total_size: u64) -> Self {
        Self {
            id,
            filename,
            total_size,
            uploaded_size: 0,
            start_time: Utc::now(),
            status: UploadStatus::Pending,
            error: None,
        }
    }

    /// A subscriber stops after sending a snapshot for which this holds.
    pub fn is_finished(&self) -> bool {
        self.uploaded_size == self.total_size || self.status != UploadStatus::Pending
    }
}
