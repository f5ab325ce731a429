//! Reader contract for populating objects from a hierarchical document.
//!
//! Concrete readers implement [`DocumentReader::read`] against the child-node
//! schema they expect; parsing from text or a file path is provided. This is
//! the document counterpart of a deserializer: pull-based, with hard errors
//! for anything required that is absent.

use std::path::Path;

use crate::document::{Document, DocumentError, DomNode};

/// Populates an output object from a document tree.
pub trait DocumentReader {
    /// The object produced by this reader.
    type Output;

    /// Build the output from an element node.
    ///
    /// Implementations should validate the element name and pull required
    /// children/attributes through the erroring accessors so that missing
    /// nodes surface as [`DocumentError`]s naming the offender.
    fn read(&self, node: &DomNode<'_>) -> Result<Self::Output, DocumentError>;

    /// Parse JSON text and read the root element.
    fn read_str(&self, text: &str) -> Result<Self::Output, DocumentError> {
        let document = Document::from_json_str(text)?;
        self.read(&document.root())
    }

    /// Parse a file and read the root element.
    fn read_path<P: AsRef<Path>>(&self, path: P) -> Result<Self::Output, DocumentError> {
        let document = Document::from_path(path)?;
        self.read(&document.root())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PairReader;

    impl DocumentReader for PairReader {
        type Output = (f64, f64);

        fn read(&self, node: &DomNode<'_>) -> Result<Self::Output, DocumentError> {
            let pair = node.child("pair")?;
            Ok((pair.attribute_f64("x")?, pair.attribute_f64("y")?))
        }
    }

    #[test]
    fn test_reader_happy_path() {
        let out = PairReader
            .read_str(r#"{"doc": {"pair": {"x": 1.0, "y": 2.0}}}"#)
            .unwrap();
        assert_eq!(out, (1.0, 2.0));
    }

    #[test]
    fn test_reader_missing_child() {
        let err = PairReader.read_str(r#"{"doc": {}}"#).unwrap_err();
        assert!(matches!(err, DocumentError::MissingElement { .. }));
    }

    #[test]
    fn test_reader_missing_file() {
        let err = PairReader
            .read_path("/nonexistent/config.json")
            .unwrap_err();
        assert!(matches!(err, DocumentError::Io { .. }));
    }
}
