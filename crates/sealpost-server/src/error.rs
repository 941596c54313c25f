// ============================================
// File: crates/sealpost-server/src/error.rs
// ============================================
//! # Server Error Types
//!
//! ## Creation Reason
//! One error type for the relay, wrapping the lower layers and mapping
//! each failure onto the `error` frame a client sees.
//!
//! ## Error → Frame Mapping
//! ```text
//! AuthenticationFailed          → authentication_failed (connection closed)
//! BadRequest / MalformedFrame   → bad_request
//! MessageTooLarge               → too_large
//! UserNotFound / PeerNotFound   → not_found
//! Forbidden                     → forbidden
//! Storage / Io                  → storage
//! everything else               → internal
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Internal errors are logged in full but reach the client only as
//!   "internal error"
//! - The reason inside `AuthenticationFailed` is for logs. The frame text
//!   is always the same so a client cannot probe which check failed
//!
//! ## Last Modified
//! v0.1.0 - Initial relay error definitions

use thiserror::Error;

use sealpost_common::{CommonError, IdentityId};
use sealpost_core::error::CoreError;
use sealpost_core::protocol::{ErrorCode, ServerFrame};
use sealpost_transport::error::TransportError;

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Server error types.
#[derive(Error, Debug)]
pub enum ServerError {
    // ========================================
    // Configuration
    // ========================================

    /// Configuration file could not be read or parsed.
    #[error("Failed to load configuration from '{path}': {reason}")]
    ConfigLoad {
        /// File that was read
        path: String,
        /// Parser or I/O message
        reason: String,
    },

    /// A configuration value is out of range.
    #[error("Invalid configuration: {field} - {reason}")]
    ConfigInvalid {
        /// Dotted field name
        field: String,
        /// What is wrong
        reason: String,
    },

    /// A required configuration value is absent.
    #[error("Missing required configuration: {field}")]
    ConfigMissing {
        /// Dotted field name
        field: String,
    },

    // ========================================
    // Relay Operations
    // ========================================

    /// Bearer credential rejected.
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed {
        /// Log-only detail
        reason: String,
    },

    /// Frame is well-formed but not acceptable here.
    #[error("Bad request: {reason}")]
    BadRequest {
        /// What was wrong
        reason: String,
    },

    /// Caller lacks the admin role.
    #[error("Forbidden: {action} requires admin")]
    Forbidden {
        /// Attempted operation
        action: String,
    },

    /// Referenced identity does not exist.
    #[error("User {0} not found")]
    UserNotFound(IdentityId),

    /// Persistence backend failed.
    #[error("Storage error: {reason}")]
    Storage {
        /// Backend message
        reason: String,
    },

    // ========================================
    // Lifecycle
    // ========================================

    /// Listener or backend could not be brought up.
    #[error("Server failed to start: {reason}")]
    StartupFailed {
        /// What failed
        reason: String,
    },

    /// Operation refused because the server is stopping.
    #[error("Server is shutting down")]
    ShuttingDown,

    /// Unexpected failure.
    #[error("Internal error: {message}")]
    Internal {
        /// Detail for logs
        message: String,
    },

    // ========================================
    // Wrapped
    // ========================================

    /// Shared error.
    #[error(transparent)]
    Common(#[from] CommonError),

    /// Protocol or crypto error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Transport error.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Creates a `ConfigLoad` error.
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `ConfigInvalid` error.
    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `ConfigMissing` error.
    pub fn config_missing(field: impl Into<String>) -> Self {
        Self::ConfigMissing {
            field: field.into(),
        }
    }

    /// Creates an `AuthenticationFailed` error.
    pub fn authentication_failed(reason: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            reason: reason.into(),
        }
    }

    /// Creates a `BadRequest` error.
    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::BadRequest {
            reason: reason.into(),
        }
    }

    /// Creates a `Forbidden` error.
    pub fn forbidden(action: impl Into<String>) -> Self {
        Self::Forbidden {
            action: action.into(),
        }
    }

    /// Creates a `Storage` error.
    pub fn storage(reason: impl ToString) -> Self {
        Self::Storage {
            reason: reason.to_string(),
        }
    }

    /// Creates a `StartupFailed` error.
    pub fn startup_failed(reason: impl Into<String>) -> Self {
        Self::StartupFailed {
            reason: reason.into(),
        }
    }

    /// Creates an `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` for configuration errors.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigLoad { .. } | Self::ConfigInvalid { .. } | Self::ConfigMissing { .. }
        )
    }

    /// Returns `true` if the server cannot continue.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigLoad { .. } | Self::ConfigMissing { .. } | Self::StartupFailed { .. }
        )
    }

    /// Returns `true` if the caller may retry the same request.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Storage { .. } | Self::Io(_) => true,
            Self::Common(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Returns `true` if the connection must be closed after this error.
    #[must_use]
    pub const fn closes_connection(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed { .. } | Self::ShuttingDown | Self::Transport(_)
        )
    }

    /// Client-facing error category.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::AuthenticationFailed { .. } => ErrorCode::AuthenticationFailed,
            Self::BadRequest { .. } => ErrorCode::BadRequest,
            Self::Forbidden { .. } => ErrorCode::Forbidden,
            Self::UserNotFound(_) => ErrorCode::NotFound,
            Self::Storage { .. } | Self::Io(_) => ErrorCode::Storage,
            Self::Core(CoreError::MessageTooLarge { .. }) => ErrorCode::TooLarge,
            Self::Core(CoreError::PeerNotFound { .. }) => ErrorCode::NotFound,
            Self::Core(CoreError::MalformedFrame { .. }) => ErrorCode::BadRequest,
            Self::Common(CommonError::NotFound { .. }) => ErrorCode::NotFound,
            Self::Common(
                CommonError::InvalidInput { .. }
                | CommonError::InvalidLength { .. }
                | CommonError::AlreadyExists { .. }
                | CommonError::Decoding { .. },
            ) => ErrorCode::BadRequest,
            _ => ErrorCode::Internal,
        }
    }

    /// Builds the `error` frame sent to the client.
    #[must_use]
    pub fn to_error_frame(&self) -> ServerFrame {
        let message = match self.code() {
            ErrorCode::AuthenticationFailed => "authentication failed".to_string(),
            ErrorCode::Internal => "internal error".to_string(),
            _ => self.to_string(),
        };
        ServerFrame::error(self.code(), message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealpost_core::protocol::ErrorFrame;

    #[test]
    fn test_error_display() {
        let err = ServerError::config_load("/etc/sealpost/server.toml", "file not found");
        assert!(err.to_string().contains("/etc/sealpost/server.toml"));
        assert_eq!(
            ServerError::UserNotFound(IdentityId::new(4)).to_string(),
            "User 4 not found"
        );
    }

    #[test]
    fn test_error_classification() {
        let config_err = ServerError::config_invalid("limits.max_connections", "must be > 0");
        assert!(config_err.is_config_error());
        assert!(!config_err.is_fatal());
        assert!(ServerError::config_missing("storage.path").is_fatal());

        assert!(ServerError::storage("disk full").is_retryable());
        assert!(!ServerError::forbidden("auditMessages").is_retryable());

        assert!(ServerError::authentication_failed("expired").closes_connection());
        assert!(!ServerError::bad_request("nope").closes_connection());
        assert!(!ServerError::storage("disk full").closes_connection());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(ServerError::forbidden("x").code(), ErrorCode::Forbidden);
        assert_eq!(
            ServerError::UserNotFound(IdentityId::new(1)).code(),
            ErrorCode::NotFound
        );
        assert_eq!(
            ServerError::from(CoreError::too_large(10, 20)).code(),
            ErrorCode::TooLarge
        );
        assert_eq!(
            ServerError::from(CoreError::malformed("eof")).code(),
            ErrorCode::BadRequest
        );
        assert_eq!(
            ServerError::from(CommonError::already_exists("user", "alice")).code(),
            ErrorCode::BadRequest
        );
        assert_eq!(ServerError::ShuttingDown.code(), ErrorCode::Internal);
    }

    #[test]
    fn test_error_frame_hides_details() {
        let frame = ServerError::authentication_failed("signature mismatch").to_error_frame();
        assert_eq!(
            frame,
            ServerFrame::Error(ErrorFrame {
                code: ErrorCode::AuthenticationFailed,
                message: "authentication failed".into(),
            })
        );

        let frame = ServerError::internal("lock poisoned").to_error_frame();
        let ServerFrame::Error(ErrorFrame { message, .. }) = frame else {
            panic!("expected error frame");
        };
        assert_eq!(message, "internal error");
    }
}
