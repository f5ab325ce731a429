//! In-memory hierarchical document model.
//!
//! A [`Document`] is parsed from JSON and exposed as a tree of named
//! [`DomNode`]s. Object-valued entries are child elements; scalar-valued
//! entries are attributes. Readers pull required elements and attributes
//! through accessors that fail loudly, naming the missing node, instead of
//! silently defaulting.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised while parsing or traversing a document.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// The file could not be read.
    #[error("cannot read document file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The document text is not valid JSON.
    #[error("malformed document: {0}")]
    Parse(#[from] serde_json::Error),

    /// The document root is not a single named element.
    #[error("document root must be an object with a single named element")]
    InvalidRoot,

    /// A required child element was not found.
    #[error("required element '{name}' not found under '{parent}'")]
    MissingElement { parent: String, name: String },

    /// A required attribute was not found on an element.
    #[error("required attribute '{name}' not found on element '{element}'")]
    MissingAttribute { element: String, name: String },

    /// An attribute exists but does not hold a value of the requested type.
    #[error("attribute '{name}' on element '{element}' is not a valid {expected}")]
    InvalidAttribute {
        element: String,
        name: String,
        expected: &'static str,
    },
}

/// A parsed hierarchical document.
///
/// The JSON root must be an object with exactly one entry; that entry names
/// the root element, mirroring the single document element of an XML file.
#[derive(Debug, Clone)]
pub struct Document {
    root_name: String,
    root: Map<String, Value>,
}

impl Document {
    /// Parse a document from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, DocumentError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(map) = value else {
            return Err(DocumentError::InvalidRoot);
        };
        if map.len() != 1 {
            return Err(DocumentError::InvalidRoot);
        }
        let (root_name, root_value) = map.into_iter().next().expect("len checked above");
        let Value::Object(root) = root_value else {
            return Err(DocumentError::InvalidRoot);
        };
        Ok(Self { root_name, root })
    }

    /// Read and parse a document from a file path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| DocumentError::Io {
            path: path.display().to_string(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "parsed document");
        Self::from_json_str(&text)
    }

    /// The root element of the document.
    pub fn root(&self) -> DomNode<'_> {
        DomNode {
            name: &self.root_name,
            entries: &self.root,
        }
    }
}

/// A named element within a [`Document`].
#[derive(Debug, Clone, Copy)]
pub struct DomNode<'a> {
    name: &'a str,
    entries: &'a Map<String, Value>,
}

impl<'a> DomNode<'a> {
    /// Element name.
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Look up a child element, if present.
    pub fn find_child(&self, name: &str) -> Option<DomNode<'a>> {
        match self.entries.get_key_value(name) {
            Some((key, Value::Object(entries))) => Some(DomNode {
                name: key.as_str(),
                entries,
            }),
            _ => None,
        }
    }

    /// Look up a required child element.
    pub fn child(&self, name: &str) -> Result<DomNode<'a>, DocumentError> {
        self.find_child(name)
            .ok_or_else(|| DocumentError::MissingElement {
                parent: self.name.to_string(),
                name: name.to_string(),
            })
    }

    /// Look up an attribute value, if present. Object-valued entries are
    /// elements, not attributes.
    pub fn find_attribute(&self, name: &str) -> Option<&'a Value> {
        match self.entries.get(name) {
            Some(Value::Object(_)) | None => None,
            Some(value) => Some(value),
        }
    }

    /// Look up a required attribute.
    pub fn attribute(&self, name: &str) -> Result<&'a Value, DocumentError> {
        self.find_attribute(name)
            .ok_or_else(|| DocumentError::MissingAttribute {
                element: self.name.to_string(),
                name: name.to_string(),
            })
    }

    /// Required string attribute.
    pub fn attribute_str(&self, name: &str) -> Result<&'a str, DocumentError> {
        self.attribute(name)?
            .as_str()
            .ok_or_else(|| self.invalid(name, "string"))
    }

    /// Required floating-point attribute.
    pub fn attribute_f64(&self, name: &str) -> Result<f64, DocumentError> {
        self.attribute(name)?
            .as_f64()
            .ok_or_else(|| self.invalid(name, "number"))
    }

    /// Required unsigned integer attribute.
    pub fn attribute_usize(&self, name: &str) -> Result<usize, DocumentError> {
        self.attribute(name)?
            .as_u64()
            .map(|v| v as usize)
            .ok_or_else(|| self.invalid(name, "unsigned integer"))
    }

    /// Required boolean attribute.
    pub fn attribute_bool(&self, name: &str) -> Result<bool, DocumentError> {
        self.attribute(name)?
            .as_bool()
            .ok_or_else(|| self.invalid(name, "boolean"))
    }

    /// Optional floating-point attribute; type mismatches still error.
    pub fn attribute_f64_opt(&self, name: &str) -> Result<Option<f64>, DocumentError> {
        match self.find_attribute(name) {
            None => Ok(None),
            Some(value) => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.invalid(name, "number")),
        }
    }

    /// Optional unsigned integer attribute; type mismatches still error.
    pub fn attribute_usize_opt(&self, name: &str) -> Result<Option<usize>, DocumentError> {
        match self.find_attribute(name) {
            None => Ok(None),
            Some(value) => value
                .as_u64()
                .map(|v| Some(v as usize))
                .ok_or_else(|| self.invalid(name, "unsigned integer")),
        }
    }

    /// Optional boolean attribute; type mismatches still error.
    pub fn attribute_bool_opt(&self, name: &str) -> Result<Option<bool>, DocumentError> {
        match self.find_attribute(name) {
            None => Ok(None),
            Some(value) => value
                .as_bool()
                .map(Some)
                .ok_or_else(|| self.invalid(name, "boolean")),
        }
    }

    fn invalid(&self, name: &str, expected: &'static str) -> DocumentError {
        DocumentError::InvalidAttribute {
            element: self.name.to_string(),
            name: name.to_string(),
            expected,
        }
    }
}
