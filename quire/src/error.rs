use std::ops::Range;
use std::sync::Arc;

use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};
use serde::Serialize;

use crate::element::Location;

/// A load-time error: markup, attribute, body or variable-flow problems found
/// before a document can be evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("{filename}:{line}: {message}")]
pub struct ValidationError {
    pub message: String,
    /// Name of the tag the error belongs to, if any.
    pub tag: Option<String>,
    pub filename: Arc<str>,
    /// 1-based line number.
    pub line: usize,
    pub span: Range<usize>,
    pub file_id: usize,
    #[serde(skip)]
    pub notes: Vec<String>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>, location: &Location) -> Self {
        ValidationError {
            message: message.into(),
            tag: None,
            filename: location.filename.clone(),
            line: location.line,
            span: location.span.clone(),
            file_id: location.file_id,
            notes: Vec::new(),
        }
    }

    pub fn in_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        let message = match &self.tag {
            Some(tag) => format!("<{}>: {}", tag, self.message),
            None => self.message.clone(),
        };
        Diagnostic::new(Severity::Error)
            .with_message(message)
            .with_labels(vec![Label::primary(self.file_id, self.span.clone())])
            .with_notes(self.notes.clone())
    }
}
