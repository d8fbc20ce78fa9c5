use crate::config::ProgressConfig;
use crate::models::{UploadRecord, UploadStatus};
use crate::services::counting_reader::CountingReader;
use crate::services::progress_registry::ProgressRegistry;
use crate::services::storage::StorageService;
use crate::utils::validation::sanitize_filename;
use anyhow::Result;
use std::io::SeekFrom;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncSeekExt, AsyncWriteExt};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// What the client declared about an upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub filename: String,
    pub size: u64,
    pub content_type: Option<String>,
}

/// Returned by [`UploadService::start_upload`] before any byte is transferred.
///
/// Dropping the ticket detaches the transfer, it keeps running.
pub struct UploadTicket {
    pub upload_id: String,
    pub object_key: String,
    /// Resolves once the outcome is recorded and the retention window is over.
    pub transfer: JoinHandle<UploadStatus>,
}

pub struct UploadService {
    storage: Arc<dyn StorageService>,
    registry: ProgressRegistry,
    config: ProgressConfig,
}

impl UploadService {
    pub fn new(
        storage: Arc<dyn StorageService>,
        registry: ProgressRegistry,
        config: ProgressConfig,
    ) -> Self {
        Self {
            storage,
            registry,
            config,
        }
    }

    /// Registers a progress record and hands the transfer to a background task.
    ///
    /// The record is in the registry when this returns. Fails only when the
    /// declared filename cannot be turned into an object key, in which case
    /// nothing is registered.
    pub fn start_upload(
        &self,
        reader: Box<dyn AsyncRead + Unpin + Send>,
        request: UploadRequest,
    ) -> Result<UploadTicket> {
        let object_key = sanitize_filename(&request.filename)?;
        let upload_id = Uuid::new_v4().to_string();

        self.registry.put(
            upload_id.clone(),
            UploadRecord::new(upload_id.clone(), request.filename.clone(), request.size),
        );

        tracing::info!(
            "⬆️  Upload {} started: '{}' ({} bytes)",
            upload_id,
            request.filename,
            request.size
        );

        let transfer = tokio::spawn(run_transfer(
            self.storage.clone(),
            self.registry.clone(),
            self.config.retention,
            upload_id.clone(),
            object_key.clone(),
            reader,
            request,
        ));

        Ok(UploadTicket {
            upload_id,
            object_key,
            transfer,
        })
    }
}

async fn run_transfer(
    storage: Arc<dyn StorageService>,
    registry: ProgressRegistry,
    retention: std::time::Duration,
    upload_id: String,
    object_key: String,
    reader: Box<dyn AsyncRead + Unpin + Send>,
    request: UploadRequest,
) -> UploadStatus {
    let counting = CountingReader::new(reader, registry.clone(), upload_id.clone());

    let result = storage
        .put_object_stream(
            &object_key,
            Box::new(counting),
            request.size,
            request.content_type.as_deref(),
        )
        .await;

    let status = match result {
        Ok(()) => {
            registry.mark_complete(&upload_id);
            tracing::info!(
                "✅ File '{}' uploaded successfully with ID '{}'",
                object_key,
                upload_id
            );
            UploadStatus::Complete
        }
        Err(e) => {
            registry.mark_failed(&upload_id, e.to_string());
            tracing::error!("❌ Upload {} of '{}' failed: {:?}", upload_id, object_key, e);
            UploadStatus::Failed
        }
    };

    if !retention.is_zero() {
        tokio::time::sleep(retention).await;
    }
    registry.delete(&upload_id);

    status
}

/// Copies `reader` into an anonymous temporary file and rewinds it.
///
/// The request body is gone once the response is sent, so the background
/// transfer reads from the spooled copy. Returns the file and its length.
pub async fn spool_to_tempfile<R>(mut reader: R) -> Result<(tokio::fs::File, u64)>
where
    R: AsyncRead + Unpin,
{
    let mut file = tokio::fs::File::from_std(tempfile::tempfile()?);
    let size = tokio::io::copy(&mut reader, &mut file).await?;
    file.flush().await?;
    file.seek(SeekFrom::Start(0)).await?;
    Ok((file, size))
}
