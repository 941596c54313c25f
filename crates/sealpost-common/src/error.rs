// ============================================
// File: crates/sealpost-common/src/error.rs
// ============================================
//! # Common Error Types
//!
//! ## Creation Reason
//! Parsing identifiers and decoding base64 fields happen in every crate.
//! `CommonError` is the shared failure type for those operations and is
//! wrapped by the per-crate error enums.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Never put key bytes, tokens or message bodies into an error message
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

/// Result alias for operations in this crate.
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors shared across sealpost crates.
#[derive(Error, Debug)]
pub enum CommonError {
    /// Input failed validation.
    #[error("Invalid input for '{field}': {reason}")]
    InvalidInput {
        /// Name of the offending field
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// Byte string has the wrong size.
    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Required size in bytes
        expected: usize,
        /// Size that was supplied
        actual: usize,
    },

    /// A looked-up record does not exist.
    #[error("Resource not found: {resource_type} with id '{id}'")]
    NotFound {
        /// Kind of record ("user", "message", ...)
        resource_type: String,
        /// Identifier that was requested
        id: String,
    },

    /// A record with the same unique key exists already.
    #[error("Resource already exists: {resource_type} with id '{id}'")]
    AlreadyExists {
        /// Kind of record
        resource_type: String,
        /// Conflicting key
        id: String,
    },

    /// System I/O failure.
    #[error("I/O error: {context}")]
    Io {
        /// Operation in progress
        context: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Failed to decode a textual or binary representation.
    #[error("Decoding error: {context}: {details}")]
    Decoding {
        /// What was being decoded
        context: String,
        /// Decoder message
        details: String,
    },

    /// Unexpected internal condition.
    #[error("Internal error: {message}")]
    Internal {
        /// Description
        message: String,
    },
}

impl CommonError {
    /// Creates an `InvalidInput` error.
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidLength` error.
    #[must_use]
    pub const fn invalid_length(expected: usize, actual: usize) -> Self {
        Self::InvalidLength { expected, actual }
    }

    /// Creates a `NotFound` error.
    pub fn not_found(resource_type: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            id: id.to_string(),
        }
    }

    /// Creates an `AlreadyExists` error.
    pub fn already_exists(resource_type: impl Into<String>, id: impl ToString) -> Self {
        Self::AlreadyExists {
            resource_type: resource_type.into(),
            id: id.to_string(),
        }
    }

    /// Creates an `Io` error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Creates a `Decoding` error.
    pub fn decoding(context: impl Into<String>, details: impl ToString) -> Self {
        Self::Decoding {
            context: context.into(),
            details: details.to_string(),
        }
    }

    /// Creates an `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` for failures caused by bad caller input.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. }
                | Self::InvalidLength { .. }
                | Self::NotFound { .. }
                | Self::AlreadyExists { .. }
                | Self::Decoding { .. }
        )
    }

    /// Returns `true` if trying again later could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

impl From<std::io::Error> for CommonError {
    fn from(err: std::io::Error) -> Self {
        Self::io("unspecified I/O operation", err)
    }
}

impl From<base64::DecodeError> for CommonError {
    fn from(err: base64::DecodeError) -> Self {
        Self::decoding("base64", err)
    }
}
