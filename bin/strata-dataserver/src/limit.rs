//! Byte-limited upload bodies

use bytes::Bytes;
use futures::Stream;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use strata_common::ByteStream;

/// Error message yielded once the limit is exceeded
pub const BODY_TOO_LARGE: &str = "request body too large";

/// Stream wrapper that fails once more than `limit` bytes went through.
///
/// Exceeding the limit yields an error instead of truncating, and raises a
/// shared flag so the caller can tell a size trip apart from other body
/// failures after the consumer has given up.
pub struct LimitedStream {
    inner: ByteStream,
    remaining: u64,
    tripped: Arc<AtomicBool>,
    done: bool,
}

impl LimitedStream {
    pub fn new(inner: ByteStream, limit: u64) -> Self {
        Self {
            inner,
            remaining: limit,
            tripped: Arc::new(AtomicBool::new(false)),
            done: false,
        }
    }

    /// Flag raised when the limit is exceeded
    pub fn tripped(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.tripped)
    }
}

impl Stream for LimitedStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                let len = chunk.len() as u64;
                if len > self.remaining {
                    self.done = true;
                    self.tripped.store(true, Ordering::SeqCst);
                    return Poll::Ready(Some(Err(io::Error::other(BODY_TOO_LARGE))));
                }
                self.remaining -= len;
                Poll::Ready(Some(Ok(chunk)))
            }
            other => other,
        }
    }
}
