//! Part header block parsing.
//!
//! A part opens with one or more `Content-Disposition` / `Content-Type`
//! lines followed by a blank line. The lines are folded into a single
//! [`PartInfo`].

use crate::error::{Error, Result};
use crate::grammar::{cfws, restricted_name, Cursor};
use crate::params::{params, Params, Spacing};

/// Content type assumed for parts that do not declare one (RFC 7578 section 4.4).
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Describes one part of a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartInfo {
    /// The form field name.
    pub name: String,
    /// `type/subtype` of the part body.
    pub content_type: String,
    /// The file name, for file uploads.
    pub filename: Option<String>,
    /// Remaining parameters from both headers, without `name` and `filename`.
    pub params: Params,
}

impl PartInfo {
    /// Reports whether the part carries a file name.
    pub fn is_file(&self) -> bool {
        self.filename.is_some()
    }
}

/// A single recognized header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartHeader {
    ContentDisposition(Params),
    ContentType { mime: String, params: Params },
}

fn header_line(cur: &mut Cursor<'_>) -> Option<PartHeader> {
    let start = cur.position();

    if cur.eat_literal_ignore_case(b"Content-Disposition:") {
        cfws(cur);
        if cur.eat_literal_ignore_case(b"form-data") {
            return Some(PartHeader::ContentDisposition(params(cur, Spacing::Cfws)));
        }
    } else if cur.eat_literal_ignore_case(b"Content-Type:") {
        cfws(cur);
        if let Some(kind) = restricted_name(cur) {
            if cur.eat(b'/') {
                if let Some(subtype) = restricted_name(cur) {
                    let mime = format!("{}/{}", kind, subtype);
                    return Some(PartHeader::ContentType {
                        mime,
                        params: params(cur, Spacing::Cfws),
                    });
                }
            }
        }
    }

    cur.reset(start);
    None
}

/// Parses a header block, including its terminating blank line.
///
/// At most `max_headers` lines are accepted.
pub fn parse_header_block(block: &[u8], max_headers: usize) -> Result<Vec<PartHeader>> {
    let mut cur = Cursor::new(block);
    let mut headers = Vec::new();

    loop {
        if headers.len() == max_headers {
            return Err(Error::MessageTooLarge);
        }
        let Some(header) = header_line(&mut cur) else {
            let line = cur.rest().split(|&b| b == b'\r').next().unwrap_or_default();
            return Err(Error::PartHeader(format!(
                "unrecognized header line {:?}",
                String::from_utf8_lossy(line)
            )));
        };
        headers.push(header);

        cfws(&mut cur);
        if !cur.eat_literal(b"\r\n") {
            return Err(Error::PartHeader(format!(
                "unexpected {:?} after header",
                String::from_utf8_lossy(cur.rest())
            )));
        }
        if cur.eat_literal(b"\r\n") {
            return Ok(headers);
        }
    }
}

fn merge_first_seen(into: &mut Params, incoming: Params) {
    for (attr, value) in incoming {
        into.entry(attr).or_insert(value);
    }
}

/// Folds header lines into a part descriptor.
///
/// Lines are folded in order and the first occurrence of anything wins: the
/// content type, `name`, `filename` and every other parameter.
pub fn fold_headers(headers: Vec<PartHeader>) -> Result<PartInfo> {
    let mut name = None;
    let mut filename = None;
    let mut content_type = None;
    let mut merged = Params::new();

    for header in headers {
        match header {
            PartHeader::ContentType { mime, params } => {
                content_type.get_or_insert(mime);
                merge_first_seen(&mut merged, params);
            }
            PartHeader::ContentDisposition(mut params) => {
                if let Some(n) = params.remove("name") {
                    name.get_or_insert(n);
                }
                if let Some(f) = params.remove("filename") {
                    filename.get_or_insert(f);
                }
                merge_first_seen(&mut merged, params);
            }
        }
    }

    let name = name.ok_or_else(|| Error::PartHeader("name parameter not found".to_string()))?;
    merged.remove("name");
    if filename.is_some() {
        merged.remove("filename");
    }

    Ok(PartInfo {
        name,
        content_type: content_type.unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
        filename,
        params: merged,
    })
}

/// Parses and folds a header block.
///
/// # Examples
///
/// ```
/// use tokio_formdata::header::parse_part_header;
///
/// let block = b"Content-Disposition: form-data; name=\"f\"; filename=\"x.txt\"\r\n\r\n";
/// let info = parse_part_header(block, 16).unwrap();
/// assert_eq!(info.name, "f");
/// assert_eq!(info.filename.as_deref(), Some("x.txt"));
/// assert_eq!(info.content_type, "text/plain");
/// ```
pub fn parse_part_header(block: &[u8], max_headers: usize) -> Result<PartInfo> {
    fold_headers(parse_header_block(block, max_headers)?)
}
