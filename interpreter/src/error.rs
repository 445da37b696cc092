use quire::ValidationError;

/// An error raised while evaluating a document.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("{0} not defined")]
    UndefinedVariable(String),
    #[error("type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },
    #[error("<{tag}>: {message}")]
    Tag {
        tag: String,
        code: u16,
        message: String,
    },
    #[error("I/O error: {0}")]
    IoError(String),
    #[error("{0}")]
    Custom(String),
}

impl RenderError {
    pub fn tag(tag: impl Into<String>, message: impl Into<String>) -> Self {
        RenderError::Tag {
            tag: tag.into(),
            code: 500,
            message: message.into(),
        }
    }

    pub fn with_code(self, code: u16) -> Self {
        match self {
            RenderError::Tag { tag, message, .. } => RenderError::Tag { tag, code, message },
            other => other,
        }
    }

    /// HTTP-like status code describing the failure.
    pub fn code(&self) -> u16 {
        match self {
            RenderError::Tag { code, .. } => *code,
            _ => 500,
        }
    }
}

/// Every load-time error found in a document. Never empty.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{} error(s) while loading document", .errors.len())]
pub struct LoadError {
    pub errors: Vec<ValidationError>,
}

impl LoadError {
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.message.clone()).collect()
    }

    pub fn contains(&self, message: &str) -> bool {
        self.errors.iter().any(|e| e.message.contains(message))
    }
}
