// src/error.rs

//! Error types for the EUPS product manager

use thiserror::Error;

/// Errors raised by product resolution, setup and declaration
#[derive(Error, Debug)]
pub enum Error {
    /// Product, version, tag assignment or stack could not be found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The caller may not write to the stack involved
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Redeclaration mismatch or tag collision
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Product names may only contain `[A-Za-z0-9_]`
    #[error("Product names may only include the characters [a-zA-Z_0-9]: saw {0}")]
    InvalidName(String),

    /// A version was required but several are declared
    #[error("Product {product} has versions \"{}\"; please choose one and try again", .versions.join("\" \""))]
    AmbiguousVersion {
        product: String,
        versions: Vec<String>,
    },

    /// The product is currently set up (or still required by another product)
    #[error("{0}; specify force to proceed")]
    SetupInUse(String),

    /// A product could not be set up
    #[error("Failed to setup {product}: {reason}")]
    SetupFailed { product: String, reason: String },

    /// No writable stack on the search path can hold the declaration
    #[error("Unable to find writable stack to declare {0}")]
    NoWritableStack(String),

    #[error("Unsupported tag: {0}")]
    TagNotRecognized(String),

    /// Malformed version expression, setup marker or manifest
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// True for the "nothing matched" family, which fallback chains swallow
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_version_message() {
        let err = Error::AmbiguousVersion {
            product: "afw".to_string(),
            versions: vec!["1.0".to_string(), "2.0".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Product afw has versions \"1.0\" \"2.0\"; please choose one and try again"
        );
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::NotFound("x".into()).is_not_found());
        assert!(!Error::Conflict("x".into()).is_not_found());
    }
}
