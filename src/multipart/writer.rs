//! Multipart form-data writer.
//!
//! Produces RFC 7578 bodies that [`Reader`](super::Reader) parses back
//! byte for byte.

use crate::boundary::Boundary;
use crate::error::{Error, Result};
use crate::grammar::is_token;
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};

const DEFAULT_FILE_TYPE: &str = "application/octet-stream";

/// A multipart form-data writer.
pub struct Writer<W> {
    writer: W,
    boundary: Boundary,
    has_parts: bool,
}

impl<W: AsyncWrite + Unpin> Writer<W> {
    /// Creates a new writer with a random boundary.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tokio_formdata::multipart::Writer;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let mut output = Vec::new();
    /// let mut writer = Writer::new(&mut output)?;
    /// writer.write_field("user", "alice").await?;
    /// writer.close().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(writer: W) -> Result<Self> {
        Ok(Self {
            writer,
            boundary: generate_boundary()?,
            has_parts: false,
        })
    }

    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    /// Sets a custom boundary.
    ///
    /// This must be called before creating any parts.
    pub fn set_boundary(&mut self, boundary: &str) -> Result<()> {
        if self.has_parts {
            return Err(Error::BoundaryFormat(
                "cannot set boundary after writing parts".to_string(),
            ));
        }
        self.boundary = Boundary::new(boundary)?;
        Ok(())
    }

    /// Returns the Content-Type header value for this body.
    pub fn form_data_content_type(&self) -> String {
        let boundary = self.boundary.as_str();
        if is_token(boundary) {
            format!("multipart/form-data; boundary={}", boundary)
        } else {
            format!("multipart/form-data; boundary=\"{}\"", boundary)
        }
    }

    /// Creates a new part with the given header lines, written in order.
    ///
    /// Returns a PartWriter that can be used to write the part's body.
    pub async fn create_part(&mut self, headers: &[(&str, String)]) -> Result<PartWriter<'_, W>> {
        if let Some((name, _)) = headers
            .iter()
            .find(|(name, value)| has_line_break(name) || has_line_break(value))
        {
            return Err(Error::PartHeader(format!(
                "line break in header {:?}",
                name
            )));
        }

        if self.has_parts {
            self.writer.write_all(b"\r\n").await?;
        }
        self.writer
            .write_all(format!("--{}\r\n", self.boundary).as_bytes())
            .await?;

        for (name, value) in headers {
            self.writer
                .write_all(format!("{}: {}\r\n", name, value).as_bytes())
                .await?;
        }

        // Empty line after headers
        self.writer.write_all(b"\r\n").await?;

        self.has_parts = true;

        Ok(PartWriter {
            writer: &mut self.writer,
        })
    }

    /// Creates a file part typed `application/octet-stream`.
    pub async fn create_form_file(
        &mut self,
        fieldname: &str,
        filename: &str,
    ) -> Result<PartWriter<'_, W>> {
        self.create_form_file_with_type(fieldname, filename, DEFAULT_FILE_TYPE)
            .await
    }

    /// Creates a file part with an explicit content type.
    pub async fn create_form_file_with_type(
        &mut self,
        fieldname: &str,
        filename: &str,
        content_type: &str,
    ) -> Result<PartWriter<'_, W>> {
        let headers = [
            (
                "Content-Disposition",
                format!(
                    "form-data; name=\"{}\"; filename=\"{}\"",
                    escape_quotes(fieldname),
                    escape_quotes(filename)
                ),
            ),
            ("Content-Type", content_type.to_string()),
        ];
        self.create_part(&headers).await
    }

    /// Creates a plain field part.
    pub async fn create_form_field(&mut self, fieldname: &str) -> Result<PartWriter<'_, W>> {
        let headers = [(
            "Content-Disposition",
            format!("form-data; name=\"{}\"", escape_quotes(fieldname)),
        )];
        self.create_part(&headers).await
    }

    /// Writes a complete field with value.
    pub async fn write_field(&mut self, fieldname: &str, value: &str) -> Result<()> {
        let mut part = self.create_form_field(fieldname).await?;
        part.write_all(value.as_bytes()).await?;
        Ok(())
    }

    /// Closes the writer by writing the final boundary.
    pub async fn close(mut self) -> Result<()> {
        if self.has_parts {
            self.writer.write_all(b"\r\n").await?;
        }
        self.writer
            .write_all(format!("--{}--\r\n", self.boundary).as_bytes())
            .await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// A writer for a single part's body.
pub struct PartWriter<'a, W> {
    writer: &'a mut W,
}

impl<'a, W: AsyncWrite + Unpin> AsyncWrite for PartWriter<'a, W> {
    fn poll_write(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<io::Result<usize>> {
        std::pin::Pin::new(&mut self.writer).poll_write(cx, buf)
    }

    fn poll_flush(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        std::pin::Pin::new(&mut self.writer).poll_flush(cx)
    }

    fn poll_shutdown(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        std::pin::Pin::new(&mut self.writer).poll_shutdown(cx)
    }
}

/// Generates a random 60 character hex boundary.
fn generate_boundary() -> Result<Boundary> {
    let mut buf = [0u8; 30];
    getrandom::getrandom(&mut buf)
        .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))?;

    let hex = buf.iter().map(|b| format!("{:02x}", b)).collect::<String>();
    Boundary::new(hex)
}

fn has_line_break(s: &str) -> bool {
    s.contains(|c| c == '\r' || c == '\n')
}

/// Escapes quotes and backslashes in a string.
fn escape_quotes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
