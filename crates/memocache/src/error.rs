//! Error types for memocache

use std::fmt;

/// Result type alias for memocache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for cache construction
#[derive(Debug)]
pub enum Error {
    /// `maxsize` is neither unbounded nor a non-negative integer
    InvalidConfiguration(String),

    /// Configuration document could not be parsed
    Parse(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::Parse(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        // serde reports our own validation failures as custom data errors
        if err.is_data() {
            Error::InvalidConfiguration(err.to_string())
        } else {
            Error::Parse(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidConfiguration("maxsize must be non-negative".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: maxsize must be non-negative"
        );
    }

    #[test]
    fn test_from_json_syntax_error() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, Error::Parse(_)));
    }
}
