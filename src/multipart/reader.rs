//! Multipart form-data reader.
//!
//! Drives a [`Scanner`] from an async byte source. The reader is a
//! [`Stream`] of [`Event`]s; [`Reader::for_each_part`] layers a per-part
//! handler with a bounded body channel on top of it.

use super::body::Body;
use super::scanner::{Event, Scanner, Step};
use crate::boundary::{parse_boundary, Boundary};
use crate::config::Limits;
use crate::error::{Error, Result};
use crate::header::PartInfo;
use bytes::Bytes;
use futures::future::{poll_fn, try_join};
use futures::{ready, Stream, StreamExt};
use pin_project::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::io::ReaderStream;
use tracing::debug;

/// A multipart/form-data reader over a stream of byte chunks.
#[pin_project]
#[derive(Debug)]
pub struct Reader<S> {
    #[pin]
    source: S,
    scanner: Scanner,
    source_done: bool,
    limits: Limits,
}

impl<S, E> Reader<S>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: Into<Error>,
{
    /// Creates a reader for a body delimited by `boundary`.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytes::Bytes;
    /// use futures::stream;
    /// use tokio_formdata::{Boundary, Reader};
    ///
    /// let chunks = vec![Ok::<_, std::io::Error>(Bytes::from_static(b"--X\r\n..."))];
    /// let reader = Reader::new(stream::iter(chunks), &Boundary::new("X").unwrap());
    /// ```
    pub fn new(source: S, boundary: &Boundary) -> Self {
        Self::with_limits(source, boundary, Limits::default())
    }

    pub fn with_limits(source: S, boundary: &Boundary, limits: Limits) -> Self {
        let limits = limits.normalized();
        Self {
            source,
            scanner: Scanner::with_limits(boundary, &limits),
            source_done: false,
            limits,
        }
    }

    /// Creates a reader from the request's `Content-Type` header value.
    pub fn from_content_type(source: S, content_type: &str) -> Result<Self> {
        Self::from_content_type_with_limits(source, content_type, Limits::default())
    }

    pub fn from_content_type_with_limits(
        source: S,
        content_type: &str,
        limits: Limits,
    ) -> Result<Self> {
        Ok(Self::with_limits(source, &parse_boundary(content_type)?, limits))
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Calls `handler` once per part, in order.
    ///
    /// The handler receives the part's descriptor and a [`Body`] that is fed
    /// while the handler runs. Once the part's closing delimiter is seen the
    /// body is closed, and nothing after it is read until the handler has
    /// returned. If the handler drops the body early the remainder of the
    /// part is skipped; if it returns an error, parsing stops with that error.
    /// A failure inside a body is delivered to the [`Body`] as
    /// [`Error::BodyAborted`].
    ///
    /// # Examples
    ///
    /// ```
    /// use bytes::Bytes;
    /// use futures::stream;
    /// use tokio_formdata::Reader;
    ///
    /// # async fn example() -> tokio_formdata::Result<()> {
    /// let body = b"--X\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nhello\r\n--X--\r\n";
    /// let source = stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(body))]);
    /// let reader = Reader::from_content_type(source, "multipart/form-data; boundary=X")?;
    ///
    /// reader
    ///     .for_each_part(|info, body| async move {
    ///         assert_eq!(info.name, "a");
    ///         assert_eq!(body.bytes().await?, Bytes::from_static(b"hello"));
    ///         Ok::<_, tokio_formdata::Error>(())
    ///     })
    ///     .await
    /// # }
    /// ```
    pub async fn for_each_part<F, Fut>(self, mut handler: F) -> Result<()>
    where
        F: FnMut(PartInfo, Body) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let capacity = self.limits.body_capacity;
        let mut events = std::pin::pin!(self);

        loop {
            match events.next().await.transpose()? {
                Some(Event::Header(info)) => {
                    // One slot beyond the capacity is kept for the abort signal.
                    let (tx, rx) = mpsc::channel(capacity + 1);
                    let pump = pump_body(events.as_mut(), tx);
                    try_join(pump, handler(info, Body::new(rx))).await?;
                }
                Some(Event::Body(_)) => {}
                Some(Event::End) => return Ok(()),
                None => return Err(Error::UnexpectedEof),
            }
        }
    }

    /// Polls the scanner, pulling from the source as needed.
    fn poll_step(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Step>>> {
        let mut this = self.project();
        loop {
            match this.scanner.step() {
                Ok(Some(step)) => return Poll::Ready(Some(Ok(step))),
                Ok(None) if this.scanner.is_finished() || *this.source_done => {
                    return Poll::Ready(None)
                }
                Ok(None) => {}
                Err(err) => return Poll::Ready(Some(Err(err))),
            }

            match ready!(this.source.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => this.scanner.push(&chunk),
                Some(Err(err)) => {
                    this.scanner.abort();
                    return Poll::Ready(Some(Err(err.into())));
                }
                None => {
                    *this.source_done = true;
                    this.scanner.finish();
                }
            }
        }
    }
}

impl<R: AsyncRead> Reader<ReaderStream<R>> {
    /// Creates a reader over an [`AsyncRead`] source.
    pub fn from_reader(reader: R, boundary: &Boundary) -> Self {
        Self::from_reader_with_limits(reader, boundary, Limits::default())
    }

    pub fn from_reader_with_limits(reader: R, boundary: &Boundary, limits: Limits) -> Self {
        let limits = limits.normalized();
        let source = ReaderStream::with_capacity(reader, limits.read_buffer_size);
        Self::with_limits(source, boundary, limits)
    }
}

impl<S, E> Stream for Reader<S>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: Into<Error>,
{
    type Item = Result<Event>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match ready!(self.as_mut().poll_step(cx)) {
                Some(Ok(Step::Event(event))) => return Poll::Ready(Some(Ok(event))),
                Some(Ok(Step::PartEnd)) => {}
                Some(Err(err)) => return Poll::Ready(Some(Err(err))),
                None => return Poll::Ready(None),
            }
        }
    }
}

/// Forwards body bytes into `tx` until the part's closing delimiter.
///
/// Returns without reading past the delimiter, which closes the body. An
/// error inside the body is sent to it as [`Error::BodyAborted`] and then
/// returned.
async fn pump_body<S, E>(
    mut events: Pin<&mut Reader<S>>,
    tx: mpsc::Sender<Result<Bytes>>,
) -> Result<()>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: Into<Error>,
{
    let abort_slot = tx.reserve().await.ok();
    let mut open = abort_slot.is_some();

    loop {
        match poll_fn(|cx| events.as_mut().poll_step(cx)).await {
            Some(Ok(Step::Event(Event::Body(chunk)))) => {
                if open && tx.send(Ok(chunk)).await.is_err() {
                    debug!("part body dropped early, skipping the rest of the part");
                    open = false;
                }
            }
            Some(Ok(Step::PartEnd)) | None => return Ok(()),
            Some(Ok(Step::Event(event))) => {
                // Headers and the end marker only follow a part end.
                return Err(Error::BoundaryType(format!("unexpected {:?} inside a part", event)));
            }
            Some(Err(err)) => {
                if let Some(slot) = abort_slot {
                    slot.send(Err(Error::BodyAborted));
                }
                return Err(err);
            }
        }
    }
}
