//! Incremental multipart body scanner.
//!
//! The scanner does no I/O. Bytes are handed to it with [`Scanner::push`] as
//! they arrive and [`Scanner::next_event`] reports part headers, body bytes
//! and the end of the body. Body bytes are released as soon as they cannot
//! be the start of a delimiter, so at most one delimiter's worth of body is
//! ever held back.

use crate::boundary::Boundary;
use crate::config::Limits;
use crate::error::{Error, Result};
use crate::header::{parse_part_header, PartInfo};
use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, trace, warn};

const CRLF: &[u8] = b"\r\n";
const HEADER_END: &[u8] = b"\r\n\r\n";

/// One step of parser output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A new part begins.
    Header(PartInfo),
    /// Bytes belonging to the most recent part.
    Body(Bytes),
    /// The closing delimiter was reached.
    End,
}

/// Scanner output including part boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Step {
    Event(Event),
    /// The closing delimiter of the current part was consumed.
    PartEnd,
}

/// Scanner states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Skipping bytes before the first delimiter.
    Preamble,
    /// A delimiter was consumed; expecting `--` or CRLF.
    AwaitPartOrEnd,
    InPartHeader,
    InPartBody,
    End,
    Failed,
}

/// Sans-I/O scanner for one multipart body.
#[derive(Debug)]
pub struct Scanner {
    /// `CRLF "--" boundary`
    delimiter: Vec<u8>,
    buf: BytesMut,
    state: State,
    eof: bool,
    /// Parts whose closing delimiter has been seen.
    parts_completed: usize,
    max_header_size: usize,
    max_headers: usize,
}

impl Scanner {
    pub fn new(boundary: &Boundary) -> Self {
        Self::with_limits(boundary, &Limits::default())
    }

    pub fn with_limits(boundary: &Boundary, limits: &Limits) -> Self {
        let mut buf = BytesMut::with_capacity(limits.read_buffer_size);
        // The first delimiter may open the body without a preceding line break.
        buf.extend_from_slice(CRLF);

        Self {
            delimiter: boundary.delimiter(),
            buf,
            state: State::Preamble,
            eof: false,
            parts_completed: 0,
            max_header_size: limits.max_header_size,
            max_headers: limits.max_headers,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Number of parts whose body has been fully scanned.
    pub fn parts_completed(&self) -> usize {
        self.parts_completed
    }

    /// Reports whether no further events will be produced.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, State::End | State::Failed)
    }

    /// Appends input. Anything after the closing delimiter is discarded.
    pub fn push(&mut self, chunk: &[u8]) {
        if self.is_finished() {
            return;
        }
        self.buf.extend_from_slice(chunk);
    }

    /// Marks the end of input.
    pub fn finish(&mut self) {
        self.eof = true;
    }

    /// Returns the next event, or `Ok(None)` when more input is needed.
    ///
    /// After `End` or an error the scanner only returns `Ok(None)`.
    pub fn next_event(&mut self) -> Result<Option<Event>> {
        loop {
            match self.step()? {
                Some(Step::Event(event)) => return Ok(Some(event)),
                Some(Step::PartEnd) => {}
                None => return Ok(None),
            }
        }
    }

    /// Like [`next_event`](Self::next_event), but stops after each part's
    /// closing delimiter before looking at what follows it.
    pub(crate) fn step(&mut self) -> Result<Option<Step>> {
        loop {
            match self.state {
                State::Preamble => {
                    if let Some(at) = find(&self.buf, &self.delimiter) {
                        self.buf.advance(at + self.delimiter.len());
                        self.transition(State::AwaitPartOrEnd);
                        continue;
                    }
                    let keep = partial_match_len(&self.buf, &self.delimiter);
                    let skip = self.buf.len() - keep;
                    self.buf.advance(skip);
                    return self.need_more();
                }
                State::AwaitPartOrEnd => {
                    let Some(marker) = self.buf.get(..2) else {
                        return self.need_more();
                    };
                    match marker {
                        b"--" => {
                            self.transition(State::End);
                            self.buf.clear();
                            return Ok(Some(Step::Event(Event::End)));
                        }
                        b"\r\n" => {
                            self.buf.advance(2);
                            self.transition(State::InPartHeader);
                        }
                        other => {
                            let msg = format!(
                                "expected CRLF or \"--\" after boundary, got {:?}",
                                String::from_utf8_lossy(other)
                            );
                            return self.fail(Error::BoundaryType(msg));
                        }
                    }
                }
                State::InPartHeader => {
                    if self.buf.starts_with(CRLF) {
                        return self.fail(Error::PartHeader("empty header block".to_string()));
                    }
                    let Some(at) = find(&self.buf, HEADER_END) else {
                        if self.buf.len() >= self.max_header_size {
                            return self.fail(Error::MessageTooLarge);
                        }
                        return self.need_more();
                    };
                    let block_len = at + HEADER_END.len();
                    if block_len > self.max_header_size {
                        return self.fail(Error::MessageTooLarge);
                    }
                    let block = self.buf.split_to(block_len);
                    match parse_part_header(&block, self.max_headers) {
                        Ok(info) => {
                            debug!(
                                name = %info.name,
                                content_type = %info.content_type,
                                filename = ?info.filename,
                                "part header parsed"
                            );
                            self.transition(State::InPartBody);
                            return Ok(Some(Step::Event(Event::Header(info))));
                        }
                        Err(err) => return self.fail(err),
                    }
                }
                State::InPartBody => {
                    if let Some(at) = find(&self.buf, &self.delimiter) {
                        if at > 0 {
                            let body = self.buf.split_to(at).freeze();
                            return Ok(Some(Step::Event(Event::Body(body))));
                        }
                        self.buf.advance(self.delimiter.len());
                        self.parts_completed += 1;
                        self.transition(State::AwaitPartOrEnd);
                        return Ok(Some(Step::PartEnd));
                    }
                    let keep = partial_match_len(&self.buf, &self.delimiter);
                    let ready = self.buf.len() - keep;
                    if keep > 0 {
                        trace!(held = keep, "holding back possible delimiter prefix");
                    }
                    if ready > 0 {
                        let body = self.buf.split_to(ready).freeze();
                        return Ok(Some(Step::Event(Event::Body(body))));
                    }
                    return self.need_more();
                }
                State::End | State::Failed => return Ok(None),
            }
        }
    }

    /// Stops scanning after a failure outside the scanner, such as a source error.
    pub(crate) fn abort(&mut self) {
        self.state = State::Failed;
        self.buf.clear();
    }

    fn transition(&mut self, to: State) {
        trace!(from = ?self.state, to = ?to, "scanner transition");
        self.state = to;
    }

    fn need_more<T>(&mut self) -> Result<Option<T>> {
        if self.eof {
            self.fail(Error::UnexpectedEof)
        } else {
            Ok(None)
        }
    }

    fn fail<T>(&mut self, err: Error) -> Result<Option<T>> {
        warn!(state = ?self.state, error = %err, "multipart parse failed");
        self.state = State::Failed;
        self.buf.clear();
        Err(err)
    }
}

/// Position of the first occurrence of `needle` in `haystack`.
fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Length of the longest proper prefix of `needle` that `haystack` ends with.
fn partial_match_len(haystack: &[u8], needle: &[u8]) -> usize {
    let max = needle.len().saturating_sub(1).min(haystack.len());
    (1..=max)
        .rev()
        .find(|&k| haystack.ends_with(&needle[..k]))
        .unwrap_or(0)
}
