//! Grammar primitives shared by the header and boundary parsers.
//!
//! Based on the RFC 2045 token definition and the RFC 5322 rules for
//! quoted strings, comments and folding whitespace. Every rule works on a
//! [`Cursor`] and restores the cursor position when it fails, so callers can
//! try alternatives in order.

/// Comments may nest, but not without bound.
const MAX_COMMENT_DEPTH: usize = 32;

/// Longest tail allowed after the first character of a `restricted_name`.
const MAX_RESTRICTED_NAME_TAIL: usize = 126;

/// A position in a byte slice that grammar rules advance.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Creates a cursor at the start of `input`.
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Current offset into the input.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Moves the cursor back to an offset previously returned by [`position`](Self::position).
    pub fn reset(&mut self, pos: usize) {
        debug_assert!(pos <= self.input.len());
        self.pos = pos;
    }

    /// The unconsumed input.
    pub fn rest(&self) -> &'a [u8] {
        &self.input[self.pos..]
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.input.len()
    }

    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    /// Consumes one byte if it satisfies `pred`.
    pub fn bump_if(&mut self, pred: impl Fn(u8) -> bool) -> Option<u8> {
        let b = self.peek().filter(|&b| pred(b))?;
        self.pos += 1;
        Some(b)
    }

    /// Consumes `b` if it is the next byte.
    pub fn eat(&mut self, b: u8) -> bool {
        self.bump_if(|c| c == b).is_some()
    }

    /// Consumes `lit` if the input continues with it, byte for byte.
    pub fn eat_literal(&mut self, lit: &[u8]) -> bool {
        if self.rest().starts_with(lit) {
            self.pos += lit.len();
            true
        } else {
            false
        }
    }

    /// Like [`eat_literal`](Self::eat_literal) but ignoring ASCII case.
    pub fn eat_literal_ignore_case(&mut self, lit: &[u8]) -> bool {
        match self.rest().get(..lit.len()) {
            Some(head) if head.eq_ignore_ascii_case(lit) => {
                self.pos += lit.len();
                true
            }
            _ => false,
        }
    }

    /// Consumes the longest run of bytes satisfying `pred`, up to `max` bytes.
    pub fn take_while_max(&mut self, max: usize, pred: impl Fn(u8) -> bool) -> &'a [u8] {
        let start = self.pos;
        let run = self.rest().iter().take(max).take_while(|&&b| pred(b)).count();
        self.pos += run;
        &self.input[start..self.pos]
    }

    /// Consumes the longest run of bytes satisfying `pred`.
    pub fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a [u8] {
        self.take_while_max(usize::MAX, pred)
    }
}

/// Reports whether the byte is in 'tspecials' as defined by RFC 1521 and RFC 2045.
///
/// tspecials := "(" / ")" / "<" / ">" / "@" / "," / ";" / ":" / "\" / <"> / "/" / "[" / "]" / "?" / "="
pub fn is_tspecial(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'@' | b',' | b';' | b':' | b'\\' | b'"' | b'/' | b'[' | b']' | b'?' | b'='
    )
}

/// Reports whether the byte is in 'token' as defined by RFC 1521 and RFC 2045.
///
/// token := 1*<any (US-ASCII) CHAR except SPACE, CTLs, or tspecials>
pub fn is_token_char(b: u8) -> bool {
    b > 0x20 && b < 0x7f && !is_tspecial(b)
}

/// Reports whether the string is a valid 'token'.
pub fn is_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(is_token_char)
}

/// Space or horizontal tab.
pub fn is_wsp(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

/// Visible US-ASCII, `%x21-7E`.
pub fn is_vchar(b: u8) -> bool {
    (0x21..=0x7e).contains(&b)
}

/// Text allowed unescaped inside a quoted string.
///
/// Octets above 0x7f are accepted so that clients sending raw UTF-8 file
/// names are not rejected.
pub fn is_qtext(b: u8) -> bool {
    (is_vchar(b) && b != b'\\' && b != b'"') || is_wsp(b) || b >= 0x80
}

/// Text allowed unescaped inside a comment.
pub fn is_ctext(b: u8) -> bool {
    is_vchar(b) && !matches!(b, b'(' | b')' | b'\\')
}

/// Characters allowed after the first in a MIME type or subtype name (RFC 6838).
pub fn is_restricted_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'!' | b'#' | b'$' | b'&' | b'-' | b'^' | b'_' | b'.' | b'+')
}

/// token := 1*token-char
pub fn token<'a>(cur: &mut Cursor<'a>) -> Option<&'a str> {
    let run = cur.take_while(is_token_char);
    if run.is_empty() {
        return None;
    }
    // token characters are ASCII
    std::str::from_utf8(run).ok()
}

/// quoted-pair := "\" (VCHAR / WSP)
///
/// Yields the escaped byte, not the backslash.
pub fn quoted_pair(cur: &mut Cursor<'_>) -> Option<u8> {
    let start = cur.position();
    if !cur.eat(b'\\') {
        return None;
    }
    match cur.bump_if(|b| is_vchar(b) || is_wsp(b)) {
        Some(b) => Some(b),
        None => {
            cur.reset(start);
            None
        }
    }
}

/// quoted-string := DQUOTE *(qtext / quoted-pair) DQUOTE
///
/// Returns the unescaped content.
pub fn quoted_string(cur: &mut Cursor<'_>) -> Option<String> {
    let start = cur.position();
    if !cur.eat(b'"') {
        return None;
    }

    let mut content = Vec::new();
    loop {
        if let Some(b) = cur.bump_if(is_qtext) {
            content.push(b);
        } else if let Some(b) = quoted_pair(cur) {
            content.push(b);
        } else {
            break;
        }
    }

    if !cur.eat(b'"') {
        cur.reset(start);
        return None;
    }
    Some(String::from_utf8_lossy(&content).into_owned())
}

/// value := token / quoted-string
pub fn param_value(cur: &mut Cursor<'_>) -> Option<String> {
    token(cur)
        .map(str::to_owned)
        .or_else(|| quoted_string(cur))
}

/// Skips spaces and tabs. Line breaks are not whitespace here.
pub fn skip_wsp(cur: &mut Cursor<'_>) {
    cur.take_while(is_wsp);
}

/// FWS := [*WSP CRLF] 1*WSP
///
/// Repeated folds are accepted. A CRLF not followed by whitespace is left in
/// place since it ends the header line.
pub fn fws(cur: &mut Cursor<'_>) -> bool {
    let start = cur.position();
    loop {
        cur.take_while(is_wsp);
        let before_fold = cur.position();
        if cur.eat_literal(b"\r\n") && !cur.take_while(is_wsp).is_empty() {
            continue;
        }
        cur.reset(before_fold);
        break;
    }
    cur.position() > start
}

/// comment := "(" *([FWS] (ctext / quoted-pair / comment)) [FWS] ")"
pub fn comment(cur: &mut Cursor<'_>) -> bool {
    comment_nested(cur, 0)
}

fn comment_nested(cur: &mut Cursor<'_>, depth: usize) -> bool {
    if depth >= MAX_COMMENT_DEPTH {
        return false;
    }
    let start = cur.position();
    if !cur.eat(b'(') {
        return false;
    }
    loop {
        fws(cur);
        if cur.bump_if(is_ctext).is_some()
            || quoted_pair(cur).is_some()
            || comment_nested(cur, depth + 1)
        {
            continue;
        }
        break;
    }
    if cur.eat(b')') {
        true
    } else {
        cur.reset(start);
        false
    }
}

/// CFWS := 1*([FWS] comment) [FWS] / FWS
///
/// Returns whether anything was consumed. The content is discarded.
pub fn cfws(cur: &mut Cursor<'_>) -> bool {
    let start = cur.position();
    while fws(cur) || comment(cur) {}
    cur.position() > start
}

/// restricted-name := ALPHA/DIGIT *126restricted-name-char
pub fn restricted_name<'a>(cur: &mut Cursor<'a>) -> Option<&'a str> {
    let start = cur.position();
    cur.bump_if(|b| b.is_ascii_alphanumeric())?;
    cur.take_while_max(MAX_RESTRICTED_NAME_TAIL, is_restricted_name_char);
    let name = &cur.input[start..cur.position()];
    std::str::from_utf8(name).ok()
}
