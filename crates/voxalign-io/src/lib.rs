pub mod document;
pub mod reader;

pub use document::{Document, DocumentError, DomNode};
pub use reader::DocumentReader;
