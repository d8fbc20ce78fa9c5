use crate::config::AppConfig;
use crate::services::storage::{S3StorageService, StorageService};
use aws_sdk_s3::config::Region;
use std::sync::Arc;
use tracing::info;

pub async fn setup_storage(config: &AppConfig) -> anyhow::Result<Arc<S3StorageService>> {
    info!(
        "☁️  S3 Storage: {} (Bucket: {})",
        config.storage_endpoint, config.bucket
    );

    let aws_config = aws_config::from_env()
        .endpoint_url(&config.storage_endpoint)
        .region(Region::new(config.storage_region.clone()))
        .credentials_provider(aws_sdk_s3::config::Credentials::new(
            config.storage_access_key.clone(),
            config.storage_secret_key.clone(),
            None,
            None,
            "static",
        ))
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(true)
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);
    let storage = S3StorageService::new(s3_client, config.bucket.clone(), config.part_size);

    ensure_bucket(&storage).await?;

    Ok(Arc::new(storage))
}

/// Creates the upload bucket when it does not exist yet.
pub async fn ensure_bucket(storage: &dyn StorageService) -> anyhow::Result<()> {
    if storage.bucket_exists().await? {
        info!("✅ Bucket is ready");
        return Ok(());
    }

    info!("🪣 Bucket not found, creating...");
    storage.create_bucket().await?;
    info!("✅ Bucket created successfully");
    Ok(())
}
