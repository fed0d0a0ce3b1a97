//! Handler registry.
//!
//! Maps command names to subscriber callbacks. Multiple handlers may be
//! registered for the same command; they are invoked in registration order.
//! UI components register while mounted and unregister on teardown using the
//! [`HandlerId`] token returned at registration.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::identifiers::HandlerId;
use crate::protocol::InboundMessage;

// ============================================================================
// Types
// ============================================================================

/// Command handler callback type.
///
/// Handlers borrow the message and close over externally-owned UI state.
/// A handler returning `Err` is logged by the router and never prevents
/// sibling handlers from running.
pub type Handler = Arc<dyn Fn(&InboundMessage) -> Result<()> + Send + Sync>;

/// A handler paired with its registration token.
struct RegisteredHandler {
    id: HandlerId,
    handler: Handler,
}

// ============================================================================
// HandlerRegistry
// ============================================================================

/// Registry of command handlers.
///
/// Not internally synchronized; the router wraps it in a lock and clones the
/// handler list out before invoking, so registration from inside a handler
/// never deadlocks.
#[derive(Default)]
pub struct HandlerRegistry {
    /// Command name → subscribers in registration order.
    handlers: FxHashMap<String, Vec<RegisteredHandler>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for a command name.
    ///
    /// Returns the token used to unregister. Handlers for the same command
    /// are kept in registration order.
    pub fn register(&mut self, command: impl Into<String>, handler: Handler) -> HandlerId {
        let id = HandlerId::next();
        self.handlers
            .entry(command.into())
            .or_default()
            .push(RegisteredHandler { id, handler });
        id
    }

    /// Removes the handler registered under `id`.
    ///
    /// Returns `true` if a handler was removed.
    pub fn unregister(&mut self, id: HandlerId) -> bool {
        let mut removed = false;

        self.handlers.retain(|_, subscribers| {
            if let Some(index) = subscribers.iter().position(|entry| entry.id == id) {
                subscribers.remove(index);
                removed = true;
            }
            !subscribers.is_empty()
        });

        removed
    }

    /// Returns the handlers for a command, in registration order.
    ///
    /// Clones the `Arc`s so the caller can invoke without holding the
    /// registry lock.
    #[must_use]
    pub fn handlers_for(&self, command: &str) -> Vec<Handler> {
        self.handlers
            .get(command)
            .map(|subscribers| {
                subscribers
                    .iter()
                    .map(|entry| Arc::clone(&entry.handler))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns `true` if any handler is registered for `command`.
    #[inline]
    #[must_use]
    pub fn has_handler(&self, command: &str) -> bool {
        self.handlers.contains_key(command)
    }

    /// Returns the number of commands with at least one subscriber.
    #[inline]
    #[must_use]
    pub fn command_count(&self) -> usize {
        self.handlers.len()
    }
}

// ============================================================================
// Tests
// ============================================================================
