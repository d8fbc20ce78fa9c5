use crate::config::ProgressConfig;
use crate::models::UploadRecord;
use crate::services::progress_registry::ProgressRegistry;
use futures::Stream;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("Progress not found for upload {0}")]
    NotFound(String),
}

/// Why a feed stopped. Every variant is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedEnd {
    /// The last snapshot showed a finished upload.
    Completed,
    /// The record left the registry between two ticks.
    NotFound,
    /// The subscriber went away.
    Disconnected,
    /// The subscriber still had unread snapshots when the next one was due.
    Lagged,
}

/// Live view of one upload for one observer.
///
/// Dropping it stops the polling task behind it.
pub struct Subscription {
    upload_id: String,
    receiver: mpsc::Receiver<UploadRecord>,
}

impl Subscription {
    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    /// Next snapshot, `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<UploadRecord> {
        self.receiver.recv().await
    }

    pub fn into_stream(mut self) -> impl Stream<Item = UploadRecord> + Send + 'static {
        async_stream::stream! {
            while let Some(snapshot) = self.receiver.recv().await {
                yield snapshot;
            }
        }
    }
}

/// Decrements the live feed counter when the polling task ends, however it ends.
struct FeedGuard(Arc<AtomicUsize>);

impl FeedGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for FeedGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct ProgressBroadcaster {
    registry: ProgressRegistry,
    config: ProgressConfig,
    active_feeds: Arc<AtomicUsize>,
}

impl ProgressBroadcaster {
    pub fn new(registry: ProgressRegistry, config: ProgressConfig) -> Self {
        Self {
            registry,
            config,
            active_feeds: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of polling tasks still running.
    pub fn active_feeds(&self) -> usize {
        self.active_feeds.load(Ordering::SeqCst)
    }

    /// Opens a feed for `upload_id`.
    ///
    /// The existence check happens here, once. A record that disappears
    /// later ends the feed cleanly instead of failing it.
    pub fn subscribe(&self, upload_id: &str) -> Result<Subscription, ProgressError> {
        if self.registry.get(upload_id).is_none() {
            return Err(ProgressError::NotFound(upload_id.to_string()));
        }

        let (tx, rx) = mpsc::channel(self.config.subscriber_buffer.max(1));
        let guard = FeedGuard::new(self.active_feeds.clone());

        tokio::spawn(poll_feed(
            self.registry.clone(),
            upload_id.to_string(),
            self.config.tick_interval,
            tx,
            guard,
        ));

        Ok(Subscription {
            upload_id: upload_id.to_string(),
            receiver: rx,
        })
    }
}

async fn poll_feed(
    registry: ProgressRegistry,
    upload_id: String,
    tick: std::time::Duration,
    tx: mpsc::Sender<UploadRecord>,
    _guard: FeedGuard,
) -> FeedEnd {
    // First snapshot goes out one tick after subscribing
    let mut ticker = interval_at(Instant::now() + tick, tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let end = loop {
        tokio::select! {
            _ = tx.closed() => break FeedEnd::Disconnected,
            _ = ticker.tick() => {
                let Some(snapshot) = registry.get(&upload_id) else {
                    break FeedEnd::NotFound;
                };
                let finished = snapshot.is_finished();

                match tx.try_send(snapshot) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => break FeedEnd::Lagged,
                    Err(TrySendError::Closed(_)) => break FeedEnd::Disconnected,
                }

                if finished {
                    break FeedEnd::Completed;
                }
            }
        }
    };

    tracing::debug!("Progress feed for {} ended: {:?}", upload_id, end);
    end
}
