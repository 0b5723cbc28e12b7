//! Error types for the stmt2ofx library.

use std::io;
use thiserror::Error;

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during parsing, validation and writing.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred during read or write operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error reading CSV input.
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    /// Error emitting the OFX XML body.
    #[error("XML writing error: {0}")]
    Xml(String),

    /// Malformed input detected by a statement parser.
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// A structurally well-formed statement or line violating a domain
    /// invariant. Carries a rendering of the offending object.
    #[error("validation error: {message}")]
    Validation { message: String, object: String },

    /// Invalid date format.
    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    /// Invalid amount format.
    #[error("Invalid amount format: {0}")]
    InvalidAmount(String),

    /// Missing required field.
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Value outside its fixed enumeration.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Unrecognized output encoding name.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),
}

impl Error {
    /// Build a validation error for `object`, keeping its debug rendering
    /// for diagnostics.
    pub fn validation(message: impl Into<String>, object: &impl std::fmt::Debug) -> Self {
        Error::Validation {
            message: message.into(),
            object: format!("{object:?}"),
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err.to_string())
    }
}
