//! Error types for the chatspace client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use chatspace::{Command, Result, Session};
//!
//! fn example(session: &Session) -> Result<()> {
//!     session.send(Command::ChatInput { content: "hi".into() })?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::SessionStopped`] |
//! | Decode | [`Error::Decode`], [`Error::NoCommand`] |
//! | Dispatch | [`Error::Handler`] |
//! | Components | [`Error::ComponentLoad`], [`Error::LoadTimeout`] |
//! | Upload | [`Error::Upload`], [`Error::UploadRejected`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Http`], [`Error::Url`] |
//!
//! Decode and dispatch errors are caught and logged inside the router; they
//! never propagate out of frame processing (see the dispatch module).

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when session configuration is invalid (bad origin URL,
    /// reserved payload keys, missing builder fields).
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    ///
    /// Returned when the connection cannot be established.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection closed while an operation was in flight.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The session was explicitly closed and will not reconnect.
    ///
    /// Returned when sending through a session after [`close`](crate::Session::close).
    #[error("Session stopped")]
    SessionStopped,

    // ========================================================================
    // Decode Errors
    // ========================================================================
    /// Inbound frame could not be decoded as a command message.
    ///
    /// The router logs these and drops the frame; they are never fatal.
    #[error("Decode error: {message}")]
    Decode {
        /// Description of the decode failure.
        message: String,
    },

    /// Inbound frame had no command tag.
    #[error("No command in frame")]
    NoCommand,

    // ========================================================================
    // Dispatch Errors
    // ========================================================================
    /// A registered handler failed or panicked during dispatch.
    ///
    /// Captured by the router; sibling handlers still run.
    #[error("Handler failed for '{command}': {message}")]
    Handler {
        /// Command the handler was registered for.
        command: String,
        /// Failure description (handler error or panic payload).
        message: String,
    },

    // ========================================================================
    // Component Errors
    // ========================================================================
    /// A workspace component bundle failed to load.
    #[error("Component '{name}' failed to load: {message}")]
    ComponentLoad {
        /// Component name.
        name: String,
        /// Description of the load failure.
        message: String,
    },

    /// A workspace component load exceeded its deadline.
    ///
    /// The dependency gate entry is force-cleared so inbound dispatch
    /// cannot stall forever.
    #[error("Component '{name}' load timed out after {timeout_ms}ms")]
    LoadTimeout {
        /// Component name.
        name: String,
        /// Milliseconds waited before the force-clear.
        timeout_ms: u64,
    },

    // ========================================================================
    // Upload Errors
    // ========================================================================
    /// File upload failed.
    #[error("Upload failed: {message}")]
    Upload {
        /// Description of the upload failure.
        message: String,
    },

    /// File rejected by the active drop configuration.
    #[error("Upload rejected for '{file}': {reason}")]
    UploadRejected {
        /// File name that was rejected.
        file: String,
        /// Why the configuration rejected it (extension, size).
        reason: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// HTTP error from the upload side-channel.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parse error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a decode error.
    #[inline]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates a handler failure error.
    #[inline]
    pub fn handler(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handler {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Creates a component load error.
    #[inline]
    pub fn component_load(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ComponentLoad {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a component load timeout error.
    #[inline]
    pub fn load_timeout(name: impl Into<String>, timeout_ms: u64) -> Self {
        Self::LoadTimeout {
            name: name.into(),
            timeout_ms,
        }
    }

    /// Creates an upload error.
    #[inline]
    pub fn upload(message: impl Into<String>) -> Self {
        Self::Upload {
            message: message.into(),
        }
    }

    /// Creates an upload rejection error.
    #[inline]
    pub fn upload_rejected(file: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UploadRejected {
            file: file.into(),
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionClosed
                | Self::SessionStopped
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this is a decode error.
    #[inline]
    #[must_use]
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::NoCommand | Self::Json(_))
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors are retried automatically (connection drops) or
    /// tolerated per frame (decode, handler, component failures). Only
    /// configuration errors and an explicit stop are terminal.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Config { .. } | Self::SessionStopped)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::connection("failed to connect");
        assert_eq!(err.to_string(), "Connection failed: failed to connect");
    }

    #[test]
    fn test_handler_error_display() {
        let err = Error::handler("append_chat", "boom");
        assert_eq!(err.to_string(), "Handler failed for 'append_chat': boom");
    }

    #[test]
    fn test_is_connection_error() {
        let conn_err = Error::connection("test");
        let closed_err = Error::ConnectionClosed;
        let stopped_err = Error::SessionStopped;
        let other_err = Error::config("test");

        assert!(conn_err.is_connection_error());
        assert!(closed_err.is_connection_error());
        assert!(stopped_err.is_connection_error());
        assert!(!other_err.is_connection_error());
    }

    #[test]
    fn test_is_decode_error() {
        assert!(Error::decode("not json").is_decode_error());
        assert!(Error::NoCommand.is_decode_error());
        assert!(!Error::ConnectionClosed.is_decode_error());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::ConnectionClosed.is_recoverable());
        assert!(Error::decode("bad frame").is_recoverable());
        assert!(Error::load_timeout("gameio", 30_000).is_recoverable());
        assert!(!Error::config("bad origin").is_recoverable());
        assert!(!Error::SessionStopped.is_recoverable());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
