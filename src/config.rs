//! Parser limits.

const DEFAULT_BODY_CAPACITY: usize = 16;
const PEEK_BUFFER_SIZE: usize = 4096;
const MAX_MIME_HEADER_SIZE: usize = 16 << 10; // 16 KB
const MAX_MIME_HEADERS: usize = 32;
const MAX_FORM_SIZE: usize = 32 << 20; // 32 MB

/// Bounds on memory used while parsing one form.
///
/// # Examples
///
/// ```
/// use tokio_formdata::Limits;
///
/// let limits = Limits::default()
///     .with_body_capacity(4)
///     .with_max_form_size(1 << 20);
/// assert_eq!(limits.body_capacity, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Chunks a part body channel holds before the scanner waits for the consumer.
    pub body_capacity: usize,
    /// Read size used when the source is an `AsyncRead`.
    pub read_buffer_size: usize,
    /// Bytes allowed in one part's header block, blank line included.
    pub max_header_size: usize,
    /// Header lines allowed per part.
    pub max_headers: usize,
    /// Body bytes a [`Form`](crate::Form) may hold in memory.
    pub max_form_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            body_capacity: DEFAULT_BODY_CAPACITY,
            read_buffer_size: PEEK_BUFFER_SIZE,
            max_header_size: MAX_MIME_HEADER_SIZE,
            max_headers: MAX_MIME_HEADERS,
            max_form_size: MAX_FORM_SIZE,
        }
    }
}

impl Limits {
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel needs room for at least one chunk, so zero is raised to one.
    pub fn with_body_capacity(mut self, chunks: usize) -> Self {
        self.body_capacity = chunks.max(1);
        self
    }

    pub fn with_read_buffer_size(mut self, bytes: usize) -> Self {
        self.read_buffer_size = bytes.max(1);
        self
    }

    pub fn with_max_header_size(mut self, bytes: usize) -> Self {
        self.max_header_size = bytes;
        self
    }

    pub fn with_max_headers(mut self, lines: usize) -> Self {
        self.max_headers = lines;
        self
    }

    pub fn with_max_form_size(mut self, bytes: usize) -> Self {
        self.max_form_size = bytes;
        self
    }

    /// Raises zero channel and read sizes to one, as the setters do for
    /// limits built by hand.
    pub(crate) fn normalized(self) -> Self {
        let body_capacity = self.body_capacity;
        let read_buffer_size = self.read_buffer_size;
        self.with_body_capacity(body_capacity)
            .with_read_buffer_size(read_buffer_size)
    }
}
