pub mod counting_reader;
pub mod progress_broadcaster;
pub mod progress_registry;
pub mod storage;
pub mod upload_service;
