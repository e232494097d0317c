//! Multipart form-data parsing and writing.

pub mod body;
pub mod formdata;
pub mod reader;
pub mod scanner;
pub mod writer;

pub use body::Body;
pub use formdata::{Field, Form};
pub use reader::Reader;
pub use scanner::{Event, Scanner, State};
pub use writer::{PartWriter, Writer};
