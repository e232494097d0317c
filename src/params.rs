//! Parameter lists: `*(";" attribute "=" value)`.
//!
//! Used by `Content-Type` and `Content-Disposition` headers, and to pull the
//! boundary out of the request's `Content-Type` value.

use crate::grammar::{cfws, param_value, skip_wsp, token, Cursor};
use std::collections::HashMap;
use std::convert::Infallible;

/// Attribute name to unescaped value. Attribute names are case-sensitive.
pub type Params = HashMap<String, String>;

/// What counts as optional whitespace around the `;` separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spacing {
    /// Spaces and tabs only.
    Wsp,
    /// RFC 5322 comments and folding whitespace.
    Cfws,
}

impl Spacing {
    pub(crate) fn skip(self, cur: &mut Cursor<'_>) {
        match self {
            Spacing::Wsp => skip_wsp(cur),
            Spacing::Cfws => {
                cfws(cur);
            }
        }
    }
}

/// Parses one `;attr=value` block, using `value` to lex the value for `attr`.
///
/// On a mismatch the cursor is left where it started and `Ok(None)` is
/// returned. Errors from `value` are passed through untouched.
pub fn param_with<E, F>(
    cur: &mut Cursor<'_>,
    spacing: Spacing,
    value: &mut F,
) -> Result<Option<(String, String)>, E>
where
    F: FnMut(&str, &mut Cursor<'_>) -> Result<Option<String>, E>,
{
    let start = cur.position();
    spacing.skip(cur);
    if !cur.eat(b';') {
        cur.reset(start);
        return Ok(None);
    }
    spacing.skip(cur);

    let Some(attr) = token(cur) else {
        cur.reset(start);
        return Ok(None);
    };
    if !cur.eat(b'=') {
        cur.reset(start);
        return Ok(None);
    }

    match value(attr, cur)? {
        Some(v) => Ok(Some((attr.to_owned(), v))),
        None => {
            cur.reset(start);
            Ok(None)
        }
    }
}

/// Parses parameters greedily until the first block that does not match.
///
/// A later duplicate attribute overwrites an earlier one.
pub fn params_with<E, F>(cur: &mut Cursor<'_>, spacing: Spacing, mut value: F) -> Result<Params, E>
where
    F: FnMut(&str, &mut Cursor<'_>) -> Result<Option<String>, E>,
{
    let mut params = Params::new();
    while let Some((attr, v)) = param_with(cur, spacing, &mut value)? {
        params.insert(attr, v);
    }
    Ok(params)
}

/// Parses parameters whose values are `token / quoted-string`.
pub fn params(cur: &mut Cursor<'_>, spacing: Spacing) -> Params {
    let parsed = params_with(cur, spacing, |_, c| Ok::<_, Infallible>(param_value(c)));
    match parsed {
        Ok(params) => params,
        Err(never) => match never {},
    }
}
