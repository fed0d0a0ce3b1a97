//! Builder pattern for session configuration.
//!
//! Provides a fluent API for configuring and creating [`Session`] instances.
//!
//! # Example
//!
//! ```no_run
//! use chatspace::Session;
//!
//! # fn example() -> chatspace::Result<()> {
//! let session = Session::builder()
//!     .origin("https://play.example.com")
//!     .build()?;
//! session.connect();
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::SocketId;
use crate::workspace::DEFAULT_LOAD_TIMEOUT;

use super::connection::DEFAULT_RECONNECT_DELAY;
use super::core::Session;
use super::transport::{Transport, WsTransport};
use super::url::session_url;

// ============================================================================
// SessionBuilder
// ============================================================================

/// Builder for configuring a [`Session`] instance.
///
/// Use [`Session::builder()`] to create a new builder.
#[derive(Default)]
pub struct SessionBuilder {
    /// Page origin the endpoint is derived from.
    origin: Option<String>,
    /// Transport override (tests, embedded deployments).
    transport: Option<Arc<dyn Transport>>,
    /// Fixed identity token override.
    socket_id: Option<SocketId>,
    /// Reconnect delay override.
    reconnect_delay: Option<Duration>,
    /// Component load deadline override.
    load_timeout: Option<Duration>,
}

// ============================================================================
// SessionBuilder Implementation
// ============================================================================

impl SessionBuilder {
    /// Creates a new session builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page origin the WebSocket endpoint is derived from.
    ///
    /// # Arguments
    ///
    /// * `origin` - Origin URL (e.g. `https://play.example.com`)
    #[inline]
    #[must_use]
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Replaces the production WebSocket transport.
    #[inline]
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Fixes the identity token instead of generating one.
    #[inline]
    #[must_use]
    pub const fn socket_id(mut self, socket_id: SocketId) -> Self {
        self.socket_id = Some(socket_id);
        self
    }

    /// Overrides the fixed reconnect delay (default 2000 ms).
    #[inline]
    #[must_use]
    pub const fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = Some(delay);
        self
    }

    /// Overrides the component load deadline (default 30 s).
    #[inline]
    #[must_use]
    pub const fn load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = Some(timeout);
        self
    }

    /// Builds the session with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the origin is missing or not a valid URL
    /// - [`Error::Config`] if the origin scheme cannot carry a WebSocket
    pub fn build(self) -> Result<Session> {
        let origin = self
            .origin
            .ok_or_else(|| Error::config("origin is required"))?;

        let origin = Url::parse(&origin)
            .map_err(|e| Error::config(format!("invalid origin '{origin}': {e}")))?;

        let socket_id = self.socket_id.unwrap_or_else(SocketId::generate);
        let url = session_url(&origin, &socket_id)?;

        let transport: Arc<dyn Transport> = self
            .transport
            .unwrap_or_else(|| Arc::new(WsTransport::new()));

        Ok(Session::from_parts(
            socket_id,
            url,
            transport,
            self.reconnect_delay.unwrap_or(DEFAULT_RECONNECT_DELAY),
            self.load_timeout.unwrap_or(DEFAULT_LOAD_TIMEOUT),
        ))
    }
}

// ============================================================================
// Tests
// ============================================================================
