#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt};
use upload_progress_backend::services::storage::{StorageError, StorageService, StoredObject};

#[derive(Debug, Clone)]
pub struct MockObject {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

/// In-memory object store. Reads the whole stream like a real put would.
pub struct MockStorageService {
    files: Mutex<HashMap<String, MockObject>>,
    fail_puts: AtomicBool,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            fail_puts: AtomicBool::new(false),
        }
    }

    /// Every put drains its stream and then fails.
    pub fn failing() -> Self {
        let storage = Self::new();
        storage.fail_puts.store(true, Ordering::SeqCst);
        storage
    }

    pub fn object(&self, key: &str) -> Option<MockObject> {
        self.files.lock().unwrap().get(key).cloned()
    }

    pub fn insert(&self, key: &str, data: &[u8], content_type: Option<&str>) {
        self.files.lock().unwrap().insert(
            key.to_string(),
            MockObject {
                data: data.to_vec(),
                content_type: content_type.map(str::to_string),
            },
        );
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn bucket_exists(&self) -> anyhow::Result<bool> {
        Ok(true)
    }

    async fn create_bucket(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn put_object_stream<'a>(
        &self,
        key: &str,
        reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
        size: u64,
        content_type: Option<&str>,
    ) -> anyhow::Result<()> {
        let mut data = Vec::new();
        reader.take(size).read_to_end(&mut data).await?;

        if self.fail_puts.load(Ordering::SeqCst) {
            anyhow::bail!("simulated store outage");
        }
        if (data.len() as u64) < size {
            return Err(StorageError::ShortRead {
                read: data.len() as u64,
                declared: size,
            }
            .into());
        }

        self.insert(key, &data, content_type);
        Ok(())
    }

    async fn get_object(&self, key: &str) -> anyhow::Result<StoredObject> {
        let object = self
            .object(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;

        Ok(StoredObject {
            size: Some(object.data.len() as i64),
            content_type: object.content_type,
            body: Box::new(std::io::Cursor::new(object.data)),
        })
    }
}
