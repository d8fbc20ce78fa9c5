use std::env;
use std::time::Duration;

/// Runtime configuration for the upload service
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Object store endpoint (default: "http://127.0.0.1:9000")
    pub storage_endpoint: String,

    /// Object store access key
    pub storage_access_key: String,

    /// Object store secret key
    pub storage_secret_key: String,

    /// Object store region (default: "us-east-1")
    pub storage_region: String,

    /// Bucket that receives uploads (default: "upload-progress-bucket")
    pub bucket: String,

    /// Part size for multipart transfers in bytes (default: 10 MB)
    pub part_size: usize,

    /// Maximum accepted request body in bytes (default: 1 GB)
    pub max_request_size: usize,

    /// Progress feed tuning
    pub progress: ProgressConfig,
}

/// Cadence and retention of the progress feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressConfig {
    /// Delay between two snapshots sent to a subscriber (default: 1s)
    pub tick_interval: Duration,

    /// How long a finished record stays visible before removal (default: 5s)
    pub retention: Duration,

    /// Snapshots a subscriber may leave unread before it is dropped (default: 1)
    pub subscriber_buffer: usize,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            retention: Duration::from_secs(5),
            subscriber_buffer: 1,
        }
    }
}

impl ProgressConfig {
    /// Load progress settings from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            tick_interval: env::var("PROGRESS_TICK_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|ms: &u64| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(default.tick_interval),

            retention: env::var("PROGRESS_RETENTION_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.retention),

            subscriber_buffer: env::var("PROGRESS_SUBSCRIBER_BUFFER")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(default.subscriber_buffer),
        }
    }

    /// Short intervals for tests running under paused or real time
    pub fn accelerated() -> Self {
        Self {
            tick_interval: Duration::from_millis(20),
            retention: Duration::from_millis(200),
            subscriber_buffer: 1,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_endpoint: "http://127.0.0.1:9000".to_string(),
            storage_access_key: String::new(),
            storage_secret_key: String::new(),
            storage_region: "us-east-1".to_string(),
            bucket: "upload-progress-bucket".to_string(),
            part_size: 10 * 1024 * 1024,          // 10 MB
            max_request_size: 1024 * 1024 * 1024, // 1 GB
            progress: ProgressConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            storage_endpoint: env::var("MINIO_ENDPOINT").unwrap_or(default.storage_endpoint),
            storage_access_key: env::var("MINIO_ACCESS_KEY")
                .unwrap_or(default.storage_access_key),
            storage_secret_key: env::var("MINIO_SECRET_KEY")
                .unwrap_or(default.storage_secret_key),
            storage_region: env::var("MINIO_REGION").unwrap_or(default.storage_region),
            bucket: env::var("MINIO_BUCKET").unwrap_or(default.bucket),

            // S3 rejects non-final parts below 5 MB
            part_size: env::var("PART_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(|v: usize| v.max(5 * 1024 * 1024))
                .unwrap_or(default.part_size),

            max_request_size: env::var("MAX_REQUEST_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_request_size),

            progress: ProgressConfig::from_env(),
        }
    }

    /// Local MinIO defaults
    pub fn development() -> Self {
        Self {
            storage_access_key: "minioadmin".to_string(),
            storage_secret_key: "minioadmin".to_string(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.part_size, 10 * 1024 * 1024);
        assert_eq!(config.bucket, "upload-progress-bucket");
        assert_eq!(config.progress.tick_interval, Duration::from_secs(1));
        assert_eq!(config.progress.subscriber_buffer, 1);
    }

    #[test]
    fn test_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.storage_access_key, "minioadmin");
        assert_eq!(config.storage_endpoint, "http://127.0.0.1:9000");
    }

    #[test]
    fn test_accelerated_progress_config() {
        let config = ProgressConfig::accelerated();
        assert!(config.tick_interval < config.retention);
        assert!(config.subscriber_buffer >= 1);
    }
}
