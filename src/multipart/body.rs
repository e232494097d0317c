//! The body of a single part, delivered through a bounded channel.

use crate::error::{Error, Result};
use bytes::{Buf, Bytes, BytesMut};
use futures::{ready, Stream};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::mpsc;

/// Body bytes of one part, in input order.
///
/// The parser waits while the channel behind a `Body` is full, so a slow
/// consumer slows the parser down rather than growing a buffer. Dropping a
/// `Body` early discards the rest of the part.
///
/// Yields chunks as a [`Stream`] and bytes through [`AsyncRead`].
#[derive(Debug)]
pub struct Body {
    rx: mpsc::Receiver<Result<Bytes>>,
    /// Unread remainder of the last chunk taken by `poll_read`.
    chunk: Bytes,
}

impl Body {
    pub(crate) fn new(rx: mpsc::Receiver<Result<Bytes>>) -> Self {
        Self {
            rx,
            chunk: Bytes::new(),
        }
    }

    /// Returns the next chunk, or `None` once the part is complete.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>> {
        if !self.chunk.is_empty() {
            return Ok(Some(std::mem::take(&mut self.chunk)));
        }
        self.rx.recv().await.transpose()
    }

    /// Collects the rest of the body.
    pub async fn bytes(self) -> Result<Bytes> {
        self.bytes_limited(usize::MAX).await
    }

    /// Collects the rest of the body, failing if it exceeds `limit` bytes.
    pub async fn bytes_limited(mut self, limit: usize) -> Result<Bytes> {
        let mut out = BytesMut::new();
        while let Some(chunk) = self.chunk().await? {
            if out.len() + chunk.len() > limit {
                return Err(Error::MessageTooLarge);
            }
            out.extend_from_slice(&chunk);
        }
        Ok(out.freeze())
    }
}

impl Stream for Body {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if !this.chunk.is_empty() {
            return Poll::Ready(Some(Ok(std::mem::take(&mut this.chunk))));
        }
        this.rx.poll_recv(cx)
    }
}

impl AsyncRead for Body {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            if !this.chunk.is_empty() {
                let n = this.chunk.len().min(buf.remaining());
                buf.put_slice(&this.chunk[..n]);
                this.chunk.advance(n);
                return Poll::Ready(Ok(()));
            }
            match ready!(this.rx.poll_recv(cx)) {
                Some(Ok(chunk)) => this.chunk = chunk,
                Some(Err(err)) => return Poll::Ready(Err(err.into())),
                None => return Poll::Ready(Ok(())),
            }
        }
    }
}
