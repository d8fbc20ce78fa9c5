pub mod download;
pub mod health;
pub mod progress;
pub mod upload;

pub use download::download_file;
pub use health::{HealthResponse, health_check};
pub use progress::progress_feed;
pub use upload::{UploadForm, UploadResponse, upload_file};
