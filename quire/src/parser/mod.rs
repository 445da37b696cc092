mod markup;

use std::sync::Arc;

use crate::element::Element;
use crate::error::ValidationError;

/// Markup reader entry point.
pub struct Parser {
    filename: Arc<str>,
    source: String,
    file_id: usize,
}

impl Parser {
    pub fn new(filename: impl Into<Arc<str>>, source: impl Into<String>, file_id: usize) -> Self {
        Parser {
            filename: filename.into(),
            source: source.into(),
            file_id,
        }
    }

    /// Read the source into its top-level elements, or every error found.
    pub fn parse(&self) -> Result<Vec<Element>, Vec<ValidationError>> {
        markup::parse_elements(&self.source, &self.filename, self.file_id)
    }
}
