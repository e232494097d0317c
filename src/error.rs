//! Error types for the form-data parser.

use std::io;
use thiserror::Error;

/// The main error type for the form-data parser.
#[derive(Error, Debug)]
pub enum Error {
    /// The byte source, or a sink fed by it, failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The `Content-Type` value is not usable as a multipart/form-data header.
    #[error("Boundary format error: {0}")]
    BoundaryFormat(String),

    /// A part's header block is malformed or lacks a `name` parameter.
    #[error("Part header error: {0}")]
    PartHeader(String),

    /// A delimiter was followed by something other than `--` or CRLF.
    #[error("Boundary type error: {0}")]
    BoundaryType(String),

    /// Input ended before the closing delimiter.
    #[error("Unexpected end of input")]
    UnexpectedEof,

    /// The part this body belonged to could not be finished.
    #[error("Part body aborted")]
    BodyAborted,

    /// A configured limit was exceeded.
    #[error("Message too large")]
    MessageTooLarge,
}

/// Specialized Result type for form-data operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => e,
            Error::UnexpectedEof => io::Error::new(io::ErrorKind::UnexpectedEof, err),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
