use anyhow::{Result, anyhow};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("stream ended after {read} of {declared} declared bytes")]
    ShortRead { read: u64, declared: u64 },
}

/// An object fetched from the store, body not yet consumed.
pub struct StoredObject {
    pub body: Box<dyn AsyncRead + Unpin + Send>,
    pub size: Option<i64>,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait StorageService: Send + Sync {
    async fn bucket_exists(&self) -> Result<bool>;
    async fn create_bucket(&self) -> Result<()>;
    /// Stores exactly `size` bytes read from `reader` under `key`.
    async fn put_object_stream<'a>(
        &self,
        key: &str,
        reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
        size: u64,
        content_type: Option<&str>,
    ) -> Result<()>;
    /// Fails with [`StorageError::NotFound`] when `key` does not exist.
    async fn get_object(&self, key: &str) -> Result<StoredObject>;
}

pub struct S3StorageService {
    client: Client,
    bucket: String,
    part_size: usize,
}

impl S3StorageService {
    pub fn new(client: Client, bucket: String, part_size: usize) -> Self {
        Self {
            client,
            bucket,
            part_size,
        }
    }

    /// Fills `buffer` from `reader` until it is full or the reader is drained.
    async fn fill_part<R>(reader: &mut R, buffer: &mut [u8]) -> Result<usize>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut n = 0;
        while n < buffer.len() {
            let read = reader.read(&mut buffer[n..]).await?;
            if read == 0 {
                break;
            }
            n += read;
        }
        Ok(n)
    }

    async fn upload_parts<R>(
        &self,
        key: &str,
        upload_id: &str,
        reader: &mut R,
        size: u64,
    ) -> Result<Vec<CompletedPart>>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut part_number = 1;
        let mut completed_parts = Vec::new();
        let mut total_size: u64 = 0;
        let mut buffer = vec![0u8; self.part_size];

        loop {
            let n = Self::fill_part(reader, &mut buffer).await?;
            if n == 0 {
                break;
            }

            total_size += n as u64;
            let upload_part_res = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .body(ByteStream::from(buffer[..n].to_vec()))
                .part_number(part_number)
                .send()
                .await?;

            completed_parts.push(
                CompletedPart::builder()
                    .e_tag(upload_part_res.e_tag().unwrap_or_default())
                    .part_number(part_number)
                    .build(),
            );

            part_number += 1;
        }

        if total_size < size {
            return Err(StorageError::ShortRead {
                read: total_size,
                declared: size,
            }
            .into());
        }

        Ok(completed_parts)
    }
}

#[async_trait]
impl StorageService for S3StorageService {
    async fn bucket_exists(&self) -> Result<bool> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(anyhow!(service_error))
                }
            }
        }
    }

    async fn create_bucket(&self) -> Result<()> {
        self.client
            .create_bucket()
            .bucket(&self.bucket)
            .send()
            .await?;
        Ok(())
    }

    async fn put_object_stream<'a>(
        &self,
        key: &str,
        reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
        size: u64,
        content_type: Option<&str>,
    ) -> Result<()> {
        // Anything past the declared size is never sent
        let mut reader = reader.take(size);

        if size <= self.part_size as u64 {
            let mut data = Vec::with_capacity(size as usize);
            reader.read_to_end(&mut data).await?;
            if (data.len() as u64) < size {
                return Err(StorageError::ShortRead {
                    read: data.len() as u64,
                    declared: size,
                }
                .into());
            }

            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .set_content_type(content_type.map(str::to_string))
                .body(ByteStream::from(data))
                .send()
                .await?;
            return Ok(());
        }

        let multipart_upload_res = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .set_content_type(content_type.map(str::to_string))
            .send()
            .await?;

        let upload_id = multipart_upload_res
            .upload_id()
            .ok_or_else(|| anyhow!("No upload ID"))?
            .to_string();

        let parts = match self.upload_parts(key, &upload_id, &mut reader, size).await {
            Ok(parts) => parts,
            Err(e) => {
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    tracing::warn!(
                        "Failed to abort multipart upload {} for {}: {:?}",
                        upload_id,
                        key,
                        abort_err
                    );
                }
                return Err(e);
            }
        };

        let completed_multipart_upload = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(completed_multipart_upload)
            .send()
            .await?;

        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<StoredObject> {
        let res = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match res {
            Ok(output) => {
                let size = output.content_length();
                let content_type = output.content_type().map(str::to_string);
                Ok(StoredObject {
                    body: Box::new(output.body.into_async_read()),
                    size,
                    content_type,
                })
            }
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    Err(StorageError::NotFound(key.to_string()).into())
                } else {
                    Err(anyhow!(service_error))
                }
            }
        }
    }
}
