mod common;

use common::MockStorageService;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use upload_progress_backend::config::ProgressConfig;
use upload_progress_backend::models::{UploadRecord, UploadStatus};
use upload_progress_backend::services::progress_broadcaster::{
    ProgressBroadcaster, ProgressError, Subscription,
};
use upload_progress_backend::services::progress_registry::ProgressRegistry;
use upload_progress_backend::services::upload_service::{UploadRequest, UploadService};

struct Harness {
    storage: Arc<MockStorageService>,
    registry: ProgressRegistry,
    uploads: UploadService,
    broadcaster: ProgressBroadcaster,
}

fn harness_with(storage: MockStorageService, config: ProgressConfig) -> Harness {
    let storage = Arc::new(storage);
    let registry = ProgressRegistry::new();
    Harness {
        uploads: UploadService::new(storage.clone(), registry.clone(), config.clone()),
        broadcaster: ProgressBroadcaster::new(registry.clone(), config),
        storage,
        registry,
    }
}

fn harness() -> Harness {
    harness_with(MockStorageService::new(), ProgressConfig::accelerated())
}

fn request(filename: &str, size: u64) -> UploadRequest {
    UploadRequest {
        filename: filename.to_string(),
        size,
        content_type: Some("application/octet-stream".to_string()),
    }
}

async fn drain(mut sub: Subscription) -> Vec<UploadRecord> {
    let mut events = Vec::new();
    while let Some(snapshot) = sub.next().await {
        events.push(snapshot);
    }
    events
}

fn assert_monotonic(events: &[UploadRecord]) {
    for pair in events.windows(2) {
        assert!(
            pair[0].uploaded_size <= pair[1].uploaded_size,
            "progress went backwards: {} -> {}",
            pair[0].uploaded_size,
            pair[1].uploaded_size
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_completed_upload_yields_single_terminal_snapshot() {
    let h = harness();
    let payload = vec![42u8; 1000];

    let ticket = h
        .uploads
        .start_upload(Box::new(Cursor::new(payload.clone())), request("report.pdf", 1000))
        .unwrap();

    assert_eq!(ticket.object_key, "report.pdf");

    // Visible before the transfer had a chance to run
    let registered = h.registry.get(&ticket.upload_id).unwrap();
    assert_eq!(registered.uploaded_size, 0);
    assert_eq!(registered.status, UploadStatus::Pending);

    let sub = h.broadcaster.subscribe(&ticket.upload_id).unwrap();
    let events = drain(sub).await;

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].uploaded_size, 1000);
    assert_eq!(events[0].total_size, 1000);
    assert_eq!(events[0].status, UploadStatus::Complete);

    assert_eq!(ticket.transfer.await.unwrap(), UploadStatus::Complete);
    assert!(h.registry.get(&ticket.upload_id).is_none());
    assert_eq!(h.storage.object("report.pdf").unwrap().data, payload);
}

#[tokio::test(start_paused = true)]
async fn test_streamed_upload_reports_partial_then_full_progress() {
    let h = harness();
    let (reader, mut writer) = tokio::io::duplex(4096);

    let ticket = h
        .uploads
        .start_upload(Box::new(reader), request("u1.bin", 1000))
        .unwrap();
    let mut sub = h.broadcaster.subscribe(&ticket.upload_id).unwrap();

    writer.write_all(&[1u8; 400]).await.unwrap();

    let first = sub.next().await.unwrap();
    assert_eq!(first.uploaded_size, 400);
    assert!(first.uploaded_size <= first.total_size);
    assert_eq!(first.status, UploadStatus::Pending);

    writer.write_all(&[2u8; 600]).await.unwrap();
    drop(writer);

    let mut events = vec![first];
    events.extend(drain(sub).await);

    assert_monotonic(&events);
    let last = events.last().unwrap();
    assert_eq!(last.uploaded_size, 1000);
    assert!(events.iter().all(|e| e.uploaded_size <= e.total_size));

    assert_eq!(ticket.transfer.await.unwrap(), UploadStatus::Complete);
    assert!(h.registry.get(&ticket.upload_id).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_unknown_id_yields_not_found_and_no_feed() {
    let h = harness();

    let result = h.broadcaster.subscribe("unknown-id");

    assert!(matches!(result, Err(ProgressError::NotFound(_))));
    assert_eq!(h.broadcaster.active_feeds(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_subscribers_see_monotonic_progress() {
    let h = harness();
    let (reader, mut writer) = tokio::io::duplex(4096);

    let ticket = h
        .uploads
        .start_upload(Box::new(reader), request("shared.bin", 1000))
        .unwrap();

    let first = h.broadcaster.subscribe(&ticket.upload_id).unwrap();
    let second = h.broadcaster.subscribe(&ticket.upload_id).unwrap();
    assert_eq!(h.broadcaster.active_feeds(), 2);

    let producer = tokio::spawn(async move {
        for _ in 0..10 {
            writer.write_all(&[9u8; 100]).await.unwrap();
            tokio::time::sleep(Duration::from_millis(30)).await;
        }
    });

    let (a, b) = tokio::join!(drain(first), drain(second));
    producer.await.unwrap();

    for events in [&a, &b] {
        assert!(!events.is_empty());
        assert_monotonic(events);
        assert_eq!(events.last().unwrap().uploaded_size, 1000);
    }
    assert_eq!(h.broadcaster.active_feeds(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_uploads_do_not_mix_progress() {
    let h = harness();
    let (reader_a, mut writer_a) = tokio::io::duplex(4096);
    let (reader_b, mut writer_b) = tokio::io::duplex(4096);

    let u1 = h
        .uploads
        .start_upload(Box::new(reader_a), request("a.bin", 300))
        .unwrap();
    let u2 = h
        .uploads
        .start_upload(Box::new(reader_b), request("b.bin", 700))
        .unwrap();
    assert_ne!(u1.upload_id, u2.upload_id);

    let mut sub_a = h.broadcaster.subscribe(&u1.upload_id).unwrap();
    let mut sub_b = h.broadcaster.subscribe(&u2.upload_id).unwrap();

    writer_a.write_all(&[1u8; 100]).await.unwrap();
    writer_b.write_all(&[2u8; 500]).await.unwrap();

    let snap_a = sub_a.next().await.unwrap();
    let snap_b = sub_b.next().await.unwrap();

    assert_eq!((snap_a.filename.as_str(), snap_a.total_size), ("a.bin", 300));
    assert_eq!(snap_a.uploaded_size, 100);
    assert_eq!((snap_b.filename.as_str(), snap_b.total_size), ("b.bin", 700));
    assert_eq!(snap_b.uploaded_size, 500);

    writer_a.write_all(&[1u8; 200]).await.unwrap();
    writer_b.write_all(&[2u8; 200]).await.unwrap();

    let rest_a = drain(sub_a).await;
    let rest_b = drain(sub_b).await;
    assert!(rest_a.iter().all(|e| e.id == u1.upload_id && e.total_size == 300));
    assert!(rest_b.iter().all(|e| e.id == u2.upload_id && e.total_size == 700));
    assert_eq!(rest_a.last().unwrap().uploaded_size, 300);
    assert_eq!(rest_b.last().unwrap().uploaded_size, 700);

    assert_eq!(u1.transfer.await.unwrap(), UploadStatus::Complete);
    assert_eq!(u2.transfer.await.unwrap(), UploadStatus::Complete);
    assert_eq!(h.storage.object("a.bin").unwrap().data, vec![1u8; 300]);
    assert_eq!(h.storage.object("b.bin").unwrap().data, vec![2u8; 700]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_transfer_is_reported_then_removed() {
    let h = harness_with(MockStorageService::failing(), ProgressConfig::accelerated());

    let ticket = h
        .uploads
        .start_upload(Box::new(Cursor::new(vec![0u8; 50])), request("doomed.bin", 50))
        .unwrap();
    let events = drain(h.broadcaster.subscribe(&ticket.upload_id).unwrap()).await;

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, UploadStatus::Failed);
    assert!(events[0].error.as_deref().unwrap().contains("simulated store outage"));

    assert_eq!(ticket.transfer.await.unwrap(), UploadStatus::Failed);
    assert!(h.registry.is_empty());
    assert!(h.storage.object("doomed.bin").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_short_stream_stalls_below_total_and_fails() {
    let h = harness();

    let ticket = h
        .uploads
        .start_upload(Box::new(Cursor::new(vec![5u8; 40])), request("short.bin", 100))
        .unwrap();
    let events = drain(h.broadcaster.subscribe(&ticket.upload_id).unwrap()).await;

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].uploaded_size, 40);
    assert_eq!(events[0].total_size, 100);
    assert_eq!(events[0].status, UploadStatus::Failed);

    assert_eq!(ticket.transfer.await.unwrap(), UploadStatus::Failed);
    assert!(h.registry.get(&ticket.upload_id).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_overlong_stream_never_exceeds_declared_size() {
    let h = harness();

    let ticket = h
        .uploads
        .start_upload(Box::new(Cursor::new(vec![3u8; 500])), request("long.bin", 200))
        .unwrap();
    let events = drain(h.broadcaster.subscribe(&ticket.upload_id).unwrap()).await;

    assert!(events.iter().all(|e| e.uploaded_size <= e.total_size));
    assert_eq!(ticket.transfer.await.unwrap(), UploadStatus::Complete);
    assert_eq!(h.storage.object("long.bin").unwrap().data.len(), 200);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_subscription_stops_polling() {
    let h = harness();
    let (reader, _writer) = tokio::io::duplex(64);

    let ticket = h
        .uploads
        .start_upload(Box::new(reader), request("idle.bin", 10))
        .unwrap();

    let mut sub = h.broadcaster.subscribe(&ticket.upload_id).unwrap();
    assert!(sub.next().await.is_some());
    assert_eq!(h.broadcaster.active_feeds(), 1);

    drop(sub);
    tokio::time::sleep(ProgressConfig::accelerated().tick_interval).await;

    assert_eq!(h.broadcaster.active_feeds(), 0);
    // The transfer itself is unaffected
    assert!(h.registry.get(&ticket.upload_id).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_zero_retention_removes_record_on_completion() {
    let config = ProgressConfig {
        retention: Duration::ZERO,
        ..ProgressConfig::accelerated()
    };
    let h = harness_with(MockStorageService::new(), config);

    let ticket = h
        .uploads
        .start_upload(Box::new(Cursor::new(vec![1u8; 10])), request("fast.bin", 10))
        .unwrap();
    let id = ticket.upload_id.clone();

    assert_eq!(ticket.transfer.await.unwrap(), UploadStatus::Complete);
    assert!(h.registry.get(&id).is_none());
    assert!(matches!(
        h.broadcaster.subscribe(&id),
        Err(ProgressError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_invalid_filename_registers_nothing() {
    let h = harness();

    let result = h
        .uploads
        .start_upload(Box::new(Cursor::new(Vec::new())), request("../", 0));

    assert!(result.is_err());
    assert!(h.registry.is_empty());
}
