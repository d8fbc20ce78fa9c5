use crate::services::progress_registry::ProgressRegistry;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

/// Pass-through reader that reports every byte it yields to the registry.
///
/// Bytes are handed to the caller untouched. The running total is
/// published before `poll_read` returns, so the registry is never behind
/// what the consumer has already seen.
pub struct CountingReader<R> {
    inner: R,
    registry: ProgressRegistry,
    upload_id: String,
    bytes_read: u64,
}

impl<R> CountingReader<R> {
    pub fn new(inner: R, registry: ProgressRegistry, upload_id: impl Into<String>) -> Self {
        Self {
            inner,
            registry,
            upload_id: upload_id.into(),
            bytes_read: 0,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for CountingReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();

        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);

        if let Poll::Ready(Ok(())) = poll {
            let n = buf.filled().len() - before;
            if n > 0 {
                this.bytes_read += n as u64;
                this.registry.advance(&this.upload_id, this.bytes_read);
            }
        }

        poll
    }
}
