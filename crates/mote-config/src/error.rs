//! Error types for configuration operations.
//!
//! # Design
//! - Keep error messages constant; carry the file, field, or operation as context fields.
//! - Access-control denials are not errors: a field outside a source's rule is skipped.

use std::io;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration source could not be read.
    #[error("configuration source unreadable")]
    Read {
        /// File name of the source.
        path: String,
        /// Source IO error.
        source: io::Error,
    },
    /// A configuration source was not valid structured data.
    #[error("configuration source malformed")]
    Parse {
        /// Source description (file name or `request`).
        origin: String,
        /// Source JSON error.
        source: serde_json::Error,
    },
    /// A field carried a value whose type does not match the schema.
    #[error("configuration field has the wrong type")]
    TypeMismatch {
        /// Dotted path of the offending field.
        path: String,
        /// Type the schema expects.
        expected: &'static str,
    },
    /// A schema lookup referenced a path that does not exist.
    #[error("unknown configuration field")]
    UnknownField {
        /// Dotted path that was requested.
        path: String,
    },
    /// Writing a configuration file to durable storage failed.
    #[error("failed to persist configuration")]
    Persist {
        /// File name that could not be written.
        path: String,
        /// Source IO error.
        source: io::Error,
    },
    /// Removing a configuration file failed.
    #[error("failed to remove configuration file")]
    Remove {
        /// File name that could not be removed.
        path: String,
        /// Source IO error.
        source: io::Error,
    },
    /// Serialising the configuration failed.
    #[error("failed to serialise configuration")]
    Emit {
        /// Source JSON error.
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// Whether the error means the source does not exist at all.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Read { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
