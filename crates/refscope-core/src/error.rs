//! Error types for the refscope catalog
//!
//! Every fallible operation in this crate returns [`Result`]. None of these
//! conditions are fatal: callers decide how to surface them.

use thiserror::Error;

/// Result type alias for catalog operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the catalog
#[derive(Error, Debug)]
pub enum Error {
    /// The host refused or failed an operation on a handle
    #[error("Resolver error: {0}")]
    Resolver(String),

    /// Writing a name snapshot failed
    #[error("Export error: {0}")]
    Export(String),

    /// A search token is not a valid regular expression
    #[error("Search expression \"{pattern}\" isn't a valid regex: {message}")]
    InvalidPattern {
        /// The offending token
        pattern: String,
        /// Compiler diagnostic
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// No record registered under the requested name
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a resolver error
    pub fn resolver(msg: impl Into<String>) -> Self {
        Self::Resolver(msg.into())
    }

    /// Create an export error
    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }

    /// Create an invalid pattern error
    pub fn invalid_pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_pattern_message_names_the_token() {
        let err = Error::invalid_pattern("[", "unclosed character class");
        assert_eq!(
            err.to_string(),
            "Search expression \"[\" isn't a valid regex: unclosed character class"
        );
    }
}
