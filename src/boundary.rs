//! Boundary extraction from a request's `Content-Type` value.
//!
//! RFC 2046 section 5.1.1:
//!
//! ```text
//! boundary := 0*69<bchars> bcharsnospace
//! bchars := bcharsnospace / " "
//! bcharsnospace := DIGIT / ALPHA / "'" / "(" / ")" / "+" / "_" / "," / "-" / "." / "/" / ":" / "=" / "?"
//! ```

use crate::error::{Error, Result};
use crate::grammar::{is_token_char, is_wsp, param_value, skip_wsp, token, Cursor};
use crate::params::{params_with, Spacing};
use std::fmt;

/// Longest boundary RFC 2046 permits.
pub const MAX_BOUNDARY_LEN: usize = 70;

const FORM_DATA: &[u8] = b"multipart/form-data";

/// A validated multipart boundary, without the leading `--`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Boundary(String);

impl Boundary {
    /// Validates `value` against the boundary grammar.
    ///
    /// # Examples
    ///
    /// ```
    /// use tokio_formdata::Boundary;
    ///
    /// assert!(Boundary::new("----WebKitFormBoundary7MA4YWxkTrZu0gW").is_ok());
    /// assert!(Boundary::new("ends with space ").is_err());
    /// ```
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if let Some(bad) = value.bytes().find(|&b| !is_bchar(b)) {
            return Err(Error::BoundaryFormat(format!(
                "invalid boundary character: {:?}",
                bad as char
            )));
        }
        check_boundary(value.as_bytes())?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The delimiter that precedes every part: `CRLF "--" boundary`.
    pub fn delimiter(&self) -> Vec<u8> {
        let mut delimiter = Vec::with_capacity(self.0.len() + 4);
        delimiter.extend_from_slice(b"\r\n--");
        delimiter.extend_from_slice(self.0.as_bytes());
        delimiter
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Boundary {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Reports whether the byte is in 'bchars'.
pub fn is_bchar(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b' ' | b'\'' | b'(' | b')' | b'+' | b'_' | b',' | b'-' | b'.' | b'/' | b':' | b'=' | b'?'
        )
}

fn check_boundary(value: &[u8]) -> Result<()> {
    match value.last() {
        None => Err(Error::BoundaryFormat("boundary is empty".to_string())),
        Some(_) if value.len() > MAX_BOUNDARY_LEN => Err(Error::BoundaryFormat(format!(
            "boundary exceeds {} characters",
            MAX_BOUNDARY_LEN
        ))),
        Some(b' ') => Err(Error::BoundaryFormat("boundary ends with a space".to_string())),
        Some(_) => Ok(()),
    }
}

/// Lexes the value of a `boundary` parameter.
///
/// Tries an optionally quoted run of bchars first. If that does not describe
/// the whole value, falls back to a plain token.
fn boundary_value(cur: &mut Cursor<'_>) -> Result<Option<String>> {
    let start = cur.position();
    let quoted = cur.eat(b'"');
    let mut run = cur.take_while(is_bchar);

    // Spaces before the next `;` separate parameters rather than end the value.
    if !quoted && run.ends_with(b" ") && next_non_wsp(cur.rest()) == Some(b';') {
        let end = run.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
        cur.reset(cur.position() - (run.len() - end));
        run = &run[..end];
    }

    let complete = if quoted {
        cur.eat(b'"')
    } else {
        !cur.peek().map_or(false, is_token_char)
    };

    if !complete {
        cur.reset(start);
        return match token(cur) {
            Some(t) if t.len() > MAX_BOUNDARY_LEN => {
                check_boundary(t.as_bytes()).map(|()| None)
            }
            Some(t) => Ok(Some(t.to_owned())),
            None => Ok(None),
        };
    }

    check_boundary(run)?;
    // bchars are ASCII
    Ok(Some(String::from_utf8_lossy(run).into_owned()))
}

fn next_non_wsp(rest: &[u8]) -> Option<u8> {
    rest.iter().copied().find(|&b| !is_wsp(b))
}

/// Extracts the boundary from a `Content-Type` header value.
///
/// A leading `Content-Type:` field name is skipped if present. The media
/// type must be exactly `multipart/form-data`.
///
/// # Examples
///
/// ```
/// use tokio_formdata::parse_boundary;
///
/// let boundary = parse_boundary("multipart/form-data; boundary=\"a b\"").unwrap();
/// assert_eq!(boundary.as_str(), "a b");
/// ```
pub fn parse_boundary(content_type: &str) -> Result<Boundary> {
    let mut cur = Cursor::new(content_type.as_bytes());
    skip_wsp(&mut cur);
    if cur.eat_literal_ignore_case(b"Content-Type:") {
        skip_wsp(&mut cur);
    }

    if !cur.eat_literal(FORM_DATA) {
        return Err(Error::BoundaryFormat("not multipart formdata".to_string()));
    }

    let mut params = params_with(&mut cur, Spacing::Wsp, |attr, c| {
        if attr == "boundary" {
            boundary_value(c)
        } else {
            Ok(param_value(c))
        }
    })?;

    params
        .remove("boundary")
        .map(Boundary)
        .ok_or_else(|| Error::BoundaryFormat("boundary parameter not found".to_string()))
}
