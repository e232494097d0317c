//! Form data held in memory.

use super::reader::Reader;
use super::scanner::{Event, Scanner};
use crate::boundary::parse_boundary;
use crate::config::Limits;
use crate::error::{Error, Result};
use crate::header::PartInfo;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};

/// One part of a form with its whole body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub info: PartInfo,
    pub data: Bytes,
}

impl Field {
    /// The body as text, if it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }
}

/// A fully parsed multipart form, parts in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Form {
    fields: Vec<Field>,
}

impl Form {
    /// Parses a complete in-memory body.
    ///
    /// # Examples
    ///
    /// ```
    /// use tokio_formdata::Form;
    ///
    /// let body = b"--X\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nhello\r\n--X--\r\n";
    /// let form = Form::parse("multipart/form-data; boundary=X", body).unwrap();
    /// assert_eq!(form.value("a"), Some("hello"));
    /// ```
    pub fn parse(content_type: &str, body: &[u8]) -> Result<Self> {
        Self::parse_with_limits(content_type, body, &Limits::default())
    }

    pub fn parse_with_limits(content_type: &str, body: &[u8], limits: &Limits) -> Result<Self> {
        let boundary = parse_boundary(content_type)?;
        let mut scanner = Scanner::with_limits(&boundary, limits);
        scanner.push(body);
        scanner.finish();

        let mut collector = Collector::new(limits.max_form_size);
        while let Some(event) = scanner.next_event()? {
            if collector.accept(event)? {
                return Ok(collector.finish());
            }
        }
        Err(Error::UnexpectedEof)
    }

    /// Reads every part from `reader` into memory.
    ///
    /// Fails with [`Error::MessageTooLarge`] once more than
    /// [`Limits::max_form_size`] body bytes have been collected.
    pub async fn read<S, E>(reader: Reader<S>) -> Result<Self>
    where
        S: Stream<Item = std::result::Result<Bytes, E>>,
        E: Into<Error>,
    {
        let mut collector = Collector::new(reader.limits().max_form_size);
        let mut events = std::pin::pin!(reader);
        while let Some(event) = events.next().await {
            if collector.accept(event?)? {
                return Ok(collector.finish());
            }
        }
        Err(Error::UnexpectedEof)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<Field> {
        self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The first field named `name`.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.info.name == name)
    }

    /// Every field named `name`.
    pub fn fields_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Field> + 'a {
        self.fields.iter().filter(move |f| f.info.name == name)
    }

    /// The text of the first non-file field named `name`.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.info.name == name && !f.info.is_file())
            .and_then(Field::text)
    }

    /// Fields carrying a file name.
    pub fn files(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.info.is_file())
    }
}

/// Accumulates events into fields.
struct Collector {
    fields: Vec<(PartInfo, BytesMut)>,
    size: usize,
    limit: usize,
}

impl Collector {
    fn new(limit: usize) -> Self {
        Self {
            fields: Vec::new(),
            size: 0,
            limit,
        }
    }

    /// Returns `true` once the closing delimiter has been seen.
    fn accept(&mut self, event: Event) -> Result<bool> {
        match event {
            Event::Header(info) => self.fields.push((info, BytesMut::new())),
            Event::Body(chunk) => {
                self.size += chunk.len();
                if self.size > self.limit {
                    return Err(Error::MessageTooLarge);
                }
                if let Some((_, data)) = self.fields.last_mut() {
                    data.extend_from_slice(&chunk);
                }
            }
            Event::End => return Ok(true),
        }
        Ok(false)
    }

    fn finish(self) -> Form {
        let fields = self
            .fields
            .into_iter()
            .map(|(info, data)| Field {
                info,
                data: data.freeze(),
            })
            .collect();
        Form { fields }
    }
}
