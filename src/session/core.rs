//! Session facade.
//!
//! A [`Session`] is the explicit connection object the page owns: it holds
//! the identity token, the command router (handler table + dependency gate)
//! and, once [`connect`](Session::connect) is called, the connection event
//! loop. Constructed once at page load via [`SessionBuilder`] and passed by
//! reference to consumers; there are no ambient globals.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::dispatch::{CommandRouter, Handler};
use crate::error::{Error, Result};
use crate::identifiers::{HandlerId, SocketId};
use crate::protocol::{Command, OutboundMessage};

use super::builder::SessionBuilder;
use super::connection::{
    Connection, ConnectionConfig, ConnectionState, LifecycleHandler, SessionEvent,
};
use super::transport::Transport;

// ============================================================================
// Session
// ============================================================================

/// One chat/game workspace session.
///
/// Owns the outbound queue, the dependency-gate pending set and the handler
/// table through its router and connection. Share it behind an [`Arc`] with
/// the collaborators that need to send or subscribe.
pub struct Session {
    /// Identity token, generated at build time.
    socket_id: SocketId,
    /// Derived WebSocket endpoint.
    url: Url,
    /// Link factory.
    transport: Arc<dyn Transport>,
    /// Inbound routing and dependency gate.
    router: Arc<CommandRouter>,
    /// Delay between a close and the reconnect attempt.
    reconnect_delay: Duration,
    /// Deadline for workspace component loads.
    load_timeout: Duration,
    /// Lifecycle callback slot, shared with the event loop.
    lifecycle: Arc<Mutex<Option<LifecycleHandler>>>,
    /// Event loop handle, present after `connect`.
    connection: Mutex<Option<Connection>>,
}

impl Session {
    /// Starts building a session.
    #[inline]
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Internal constructor used by the builder.
    pub(crate) fn from_parts(
        socket_id: SocketId,
        url: Url,
        transport: Arc<dyn Transport>,
        reconnect_delay: Duration,
        load_timeout: Duration,
    ) -> Self {
        Self {
            socket_id,
            url,
            transport,
            router: Arc::new(CommandRouter::new()),
            reconnect_delay,
            load_timeout,
            lifecycle: Arc::new(Mutex::new(None)),
            connection: Mutex::new(None),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("socket_id", &self.socket_id)
            .field("url", &self.url)
            .field("reconnect_delay", &self.reconnect_delay)
            .field("load_timeout", &self.load_timeout)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Session - Connection Lifecycle
// ============================================================================

impl Session {
    /// Starts the connection event loop and dials the endpoint.
    ///
    /// Idempotent: calling again while a connection exists (open, closed or
    /// stopped) is a no-op.
    pub fn connect(&self) {
        let mut connection = self.connection.lock();

        if connection.is_some() {
            debug!("connect ignored, connection already exists");
            return;
        }

        *connection = Some(Connection::spawn(ConnectionConfig {
            url: self.url.clone(),
            socket_id: self.socket_id,
            transport: Arc::clone(&self.transport),
            router: Arc::clone(&self.router),
            reconnect_delay: self.reconnect_delay,
            lifecycle: Arc::clone(&self.lifecycle),
        }));
    }

    /// Stops the connection permanently.
    ///
    /// Cancels any pending reconnect and transitions to the terminal
    /// [`ConnectionState::Stopped`] state; further sends fail with
    /// [`Error::SessionStopped`].
    pub fn close(&self) {
        if let Some(connection) = self.connection.lock().as_ref() {
            connection.stop();
        }
    }

    /// Returns the connection state.
    ///
    /// Reports [`ConnectionState::Closed`] before `connect` is called.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.connection
            .lock()
            .as_ref()
            .map_or(ConnectionState::Closed, Connection::state)
    }

    /// Returns the number of messages queued for the next reconnect.
    #[must_use]
    pub fn queued_count(&self) -> usize {
        self.connection
            .lock()
            .as_ref()
            .map_or(0, Connection::queued_count)
    }

    /// Sets the lifecycle event callback.
    ///
    /// Set it before `connect` to observe the first [`SessionEvent::Opened`].
    pub fn set_lifecycle_handler<F>(&self, handler: F)
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        *self.lifecycle.lock() = Some(Box::new(handler));
    }

    /// Clears the lifecycle event callback.
    pub fn clear_lifecycle_handler(&self) {
        *self.lifecycle.lock() = None;
    }
}

// ============================================================================
// Session - Sending
// ============================================================================

impl Session {
    /// Sends a typed command.
    ///
    /// Queued if the connection is not open; never blocks.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if `connect` has not been called
    /// - [`Error::SessionStopped`] after `close`
    pub fn send(&self, command: Command) -> Result<()> {
        self.send_message(OutboundMessage::from_command(command)?)
    }

    /// Sends an ad hoc command with raw payload fields.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if `fields` uses a reserved envelope key
    /// - [`Error::ConnectionClosed`] if `connect` has not been called
    /// - [`Error::SessionStopped`] after `close`
    pub fn send_raw(&self, command: &str, fields: Map<String, Value>) -> Result<()> {
        self.send_message(OutboundMessage::new(command, fields)?)
    }

    /// Sends a pre-built message.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if `connect` has not been called
    /// - [`Error::SessionStopped`] after `close`
    pub fn send_message(&self, message: OutboundMessage) -> Result<()> {
        self.connection
            .lock()
            .as_ref()
            .ok_or(Error::ConnectionClosed)?
            .send(message)
    }
}

// ============================================================================
// Session - Dispatch
// ============================================================================

impl Session {
    /// Registers a handler for an inbound command.
    pub fn register(&self, command: impl Into<String>, handler: Handler) -> HandlerId {
        self.router.register(command, handler)
    }

    /// Removes the handler registered under `id`.
    ///
    /// Returns `true` if a handler was removed.
    pub fn unregister(&self, id: HandlerId) -> bool {
        self.router.unregister(id)
    }

    /// Marks a named resource as loading, gating inbound dispatch.
    pub fn begin_load(&self, name: &str) {
        self.router.begin_load(name);
    }

    /// Resolves a named resource, flushing held frames once the pending set
    /// empties. Idempotent for non-pending names.
    pub fn complete_load(&self, name: &str) {
        self.router.complete_load(name);
    }

    /// Returns the router for collaborators that attach their own handlers.
    #[inline]
    #[must_use]
    pub fn router(&self) -> &Arc<CommandRouter> {
        &self.router
    }
}

// ============================================================================
// Session - Accessors
// ============================================================================

impl Session {
    /// Returns the session identity token.
    #[inline]
    #[must_use]
    pub const fn socket_id(&self) -> SocketId {
        self.socket_id
    }

    /// Returns the derived WebSocket endpoint URL.
    #[inline]
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the configured component load deadline.
    #[inline]
    #[must_use]
    pub const fn load_timeout(&self) -> Duration {
        self.load_timeout
    }
}

// ============================================================================
// Tests
// ============================================================================
