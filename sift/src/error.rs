//! Error types for filter loading and compilation.

/// Message used when a negated filter expands to more than one OR clause.
pub const UNSUPPORTED_NEGATION: &str = "Cannot negate a filter with multiple OR clauses";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("1 validation error at {path}: {message}")]
    Validation { path: String, message: String },

    #[error("Invalid URN for {field}: {value:?} ({reason})")]
    InvalidUrn {
        field: String,
        value: String,
        reason: String,
    },

    #[error("{}", UNSUPPORTED_NEGATION)]
    UnsupportedNegation,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    pub(crate) fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            path: path.into(),
            message: message.into(),
        }
    }

    /// True when the error is the negation modeling restriction rather than bad input.
    pub fn is_unsupported_negation(&self) -> bool {
        matches!(self, Error::UnsupportedNegation)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
