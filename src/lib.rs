//! Streaming `multipart/form-data` parsing with an async-first design.
//!
//! This crate provides:
//! - Boundary extraction from a `Content-Type` value (RFC 2046, RFC 7578)
//! - Part header parsing of `Content-Disposition` and `Content-Type`
//!   (RFC 5322 grammar: tokens, quoted strings, comments, folding whitespace)
//! - An incremental scanner that emits part headers and body bytes as they
//!   arrive, without holding the whole body in memory
//! - An async reader that hands each part's body to a handler through a
//!   bounded channel, so slow consumers apply backpressure
//! - A form-data writer
//!
//! All I/O operations are async-first using tokio.
//!
//! # Examples
//!
//! ```
//! use tokio_formdata::Form;
//!
//! let body = b"--X\r\n\
//! Content-Disposition: form-data; name=\"f\"; filename=\"x.txt\"\r\n\
//! Content-Type: text/plain\r\n\
//! \r\n\
//! contents\r\n\
//! --X--\r\n";
//!
//! let form = Form::parse("multipart/form-data; boundary=X", body).unwrap();
//! let file = form.field("f").unwrap();
//! assert_eq!(file.info.filename.as_deref(), Some("x.txt"));
//! assert_eq!(&file.data[..], b"contents");
//! ```

pub mod boundary;
pub mod config;
pub mod error;
pub mod grammar;
pub mod header;
pub mod multipart;
pub mod params;

// Re-export commonly used types
pub use boundary::{parse_boundary, Boundary};
pub use config::Limits;
pub use error::{Error, Result};
pub use header::PartInfo;
pub use multipart::{Body, Event, Field, Form, Reader, Writer};
pub use params::Params;
