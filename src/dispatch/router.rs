//! Command router.
//!
//! Decodes raw frames, runs them through the dependency gate, and invokes
//! registered handlers.
//!
//! # Failure isolation
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Malformed frame / missing command | logged, dropped |
//! | Unknown command | logged, ignored (older clients must tolerate newer servers) |
//! | Handler error or panic | logged, sibling handlers and later frames unaffected |
//!
//! Nothing in this module returns an error to the transport; frame
//! processing is infallible from the connection's point of view.

// ============================================================================
// Imports
// ============================================================================

use std::panic::{AssertUnwindSafe, catch_unwind};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::identifiers::HandlerId;
use crate::protocol::InboundMessage;

use super::gate::{Admission, DependencyGate};
use super::registry::{Handler, HandlerRegistry};

// ============================================================================
// DispatchOutcome
// ============================================================================

/// What happened to a frame offered to the router.
///
/// Only the outcome of the offered frame itself is reported; frames flushed
/// from the buffer as a side effect log their own outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Invoked at least zero handlers; carries how many succeeded.
    Delivered {
        /// Number of handlers that ran without error.
        handlers: usize,
    },
    /// Held by the dependency gate for a later flush.
    Buffered,
    /// No handler registered for the command.
    Unhandled,
    /// Decode failure; frame discarded.
    Dropped,
}

// ============================================================================
// CommandRouter
// ============================================================================

/// Routes inbound frames to registered handlers through the dependency gate.
pub struct CommandRouter {
    /// Handler table.
    registry: Mutex<HandlerRegistry>,
    /// Admission control for frames arriving during component loads.
    gate: DependencyGate,
}

impl Default for CommandRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRouter {
    /// Creates a router with an empty handler table and an open gate.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(HandlerRegistry::new()),
            gate: DependencyGate::new(),
        }
    }

    /// Registers a handler for a command name.
    pub fn register(&self, command: impl Into<String>, handler: Handler) -> HandlerId {
        self.registry.lock().register(command, handler)
    }

    /// Removes the handler registered under `id`.
    ///
    /// Returns `true` if a handler was removed.
    pub fn unregister(&self, id: HandlerId) -> bool {
        self.registry.lock().unregister(id)
    }

    /// Returns `true` if any handler is registered for `command`.
    #[inline]
    #[must_use]
    pub fn has_handler(&self, command: &str) -> bool {
        self.registry.lock().has_handler(command)
    }

    /// Decodes and dispatches a raw text frame.
    ///
    /// Never panics and never returns an error: decode failures are logged
    /// and the frame dropped.
    pub fn dispatch(&self, raw: &str) -> DispatchOutcome {
        match InboundMessage::parse(raw) {
            Ok(message) => self.dispatch_message(message),
            Err(error) => {
                warn!(%error, frame = raw, "dropping undecodable frame");
                DispatchOutcome::Dropped
            }
        }
    }

    /// Dispatches an already-parsed message.
    pub fn dispatch_message(&self, message: InboundMessage) -> DispatchOutcome {
        match self.gate.admit(message) {
            Admission::Buffered => {
                debug!(
                    buffered = self.gate.buffered_count(),
                    "frame held, dependency loads pending"
                );
                DispatchOutcome::Buffered
            }
            Admission::Dispatch(message) => {
                let outcome = self.invoke(&message);
                self.drain();
                outcome
            }
        }
    }

    /// Marks a named resource as loading (see the gate module).
    pub fn begin_load(&self, name: &str) {
        self.gate.begin_load(name);
    }

    /// Resolves a named resource; flushes held frames if the pending set
    /// emptied and no drain is already running.
    pub fn complete_load(&self, name: &str) {
        if self.gate.complete_load(name) && self.gate.try_begin_drain() {
            self.drain();
        }
    }

    /// Number of outstanding dependency loads.
    #[inline]
    #[must_use]
    pub fn pending_loads(&self) -> usize {
        self.gate.pending_count()
    }

    /// Number of frames held by the gate.
    #[inline]
    #[must_use]
    pub fn buffered_frames(&self) -> usize {
        self.gate.buffered_count()
    }

    /// Drains held frames until the buffer empties or the gate re-closes.
    fn drain(&self) {
        while let Some(message) = self.gate.next_buffered() {
            self.invoke(&message);
        }
    }

    /// Invokes every handler registered for the message's command.
    fn invoke(&self, message: &InboundMessage) -> DispatchOutcome {
        let command = message.command();
        let handlers = self.registry.lock().handlers_for(command);

        if handlers.is_empty() {
            debug!(command, "unknown command ignored");
            return DispatchOutcome::Unhandled;
        }

        let mut succeeded = 0;
        for handler in &handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(message))) {
                Ok(Ok(())) => succeeded += 1,
                Ok(Err(error)) => {
                    warn!(command, %error, "handler failed");
                }
                Err(payload) => {
                    warn!(
                        command,
                        panic = panic_message(payload.as_ref()),
                        "handler panicked"
                    );
                }
            }
        }

        DispatchOutcome::Delivered {
            handlers: succeeded,
        }
    }
}

/// Extracts a printable message from a panic payload.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_handler(counter: Arc<AtomicUsize>) -> Handler {
        Arc::new(move |_msg| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn test_dispatch_invokes_handler() {
        let router = CommandRouter::new();
        let counter = Arc::new(AtomicUsize::new(0));
        router.register("append_chat", counting_handler(Arc::clone(&counter)));

        let outcome = router.dispatch(r#"{"cmd":"append_chat","content":"hi"}"#);

        assert_eq!(outcome, DispatchOutcome::Delivered { handlers: 1 });
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_undecodable_frame_dropped() {
        let router = CommandRouter::new();
        assert_eq!(router.dispatch("not json"), DispatchOutcome::Dropped);
        assert_eq!(router.dispatch(r#"{"no":"command"}"#), DispatchOutcome::Dropped);
    }

    #[test]
    fn test_unknown_command_ignored() {
        let router = CommandRouter::new();
        let outcome = router.dispatch(r#"{"cmd":"future_feature"}"#);
        assert_eq!(outcome, DispatchOutcome::Unhandled);
    }

    #[test]
    fn test_handler_error_does_not_stop_siblings() {
        let router = CommandRouter::new();
        let counter = Arc::new(AtomicUsize::new(0));

        router.register(
            "append_chat",
            Arc::new(|_msg| Err(crate::error::Error::handler("append_chat", "boom"))),
        );
        router.register("append_chat", counting_handler(Arc::clone(&counter)));

        let outcome = router.dispatch(r#"{"cmd":"append_chat"}"#);

        assert_eq!(outcome, DispatchOutcome::Delivered { handlers: 1 });
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_handler_does_not_poison_dispatch() {
        // Scenario: a handler registered for append_chat panics on
        // invocation; a handler for set_user_data still receives its
        // dispatch for a later frame.
        let router = CommandRouter::new();
        let counter = Arc::new(AtomicUsize::new(0));

        router.register("append_chat", Arc::new(|_msg| panic!("render exploded")));
        router.register("set_user_data", counting_handler(Arc::clone(&counter)));

        let first = router.dispatch(r#"{"cmd":"append_chat","content":"hi"}"#);
        let second = router.dispatch(r#"{"cmd":"set_user_data","uid":"u1"}"#);

        assert_eq!(first, DispatchOutcome::Delivered { handlers: 0 });
        assert_eq!(second, DispatchOutcome::Delivered { handlers: 1 });
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_gated_frame_buffers_then_flushes_once() {
        // Scenario: workspace_component begins a load; a gameio_init frame
        // arriving before complete_load is buffered, then dispatched exactly
        // once after the load resolves.
        let router = CommandRouter::new();
        let counter = Arc::new(AtomicUsize::new(0));
        router.register("gameio_init", counting_handler(Arc::clone(&counter)));

        router.begin_load("gameio");
        let outcome = router.dispatch(r#"{"cmd":"gameio_init","board_image":"b.png"}"#);

        assert_eq!(outcome, DispatchOutcome::Buffered);
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        router.complete_load("gameio");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(router.buffered_frames(), 0);
    }

    #[test]
    fn test_flush_order_matches_arrival_order() {
        let router = CommandRouter::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for cmd in ["a", "b", "c"] {
            let order = Arc::clone(&order);
            router.register(
                cmd,
                Arc::new(move |msg| {
                    order.lock().push(msg.command().to_string());
                    Ok(())
                }),
            );
        }

        router.begin_load("gameio");
        for cmd in ["a", "b", "c"] {
            router.dispatch(&format!(r#"{{"cmd":"{cmd}"}}"#));
        }
        router.complete_load("gameio");

        assert_eq!(*order.lock(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_complete_load_for_non_pending_name_does_not_flush() {
        let router = CommandRouter::new();
        let counter = Arc::new(AtomicUsize::new(0));
        router.register("gameio_init", counting_handler(Arc::clone(&counter)));

        router.begin_load("gameio");
        router.dispatch(r#"{"cmd":"gameio_init"}"#);
        router.complete_load("never_begun");

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(router.buffered_frames(), 1);
    }

    #[test]
    fn test_handler_begin_load_mid_flush_regates() {
        // A flushed handler re-opens the gate; the remaining held frame must
        // not dispatch until the new load resolves.
        let router = Arc::new(CommandRouter::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let gate_router = Arc::clone(&router);
        router.register(
            "workspace_component",
            Arc::new(move |msg| {
                gate_router.begin_load(&msg.get_str("name"));
                Ok(())
            }),
        );
        router.register("gameio_init", counting_handler(Arc::clone(&counter)));

        router.begin_load("tabs");
        router.dispatch(r#"{"cmd":"workspace_component","name":"gameio"}"#);
        router.dispatch(r#"{"cmd":"gameio_init"}"#);

        // Flush runs the workspace_component handler, which re-closes the
        // gate before gameio_init is reached.
        router.complete_load("tabs");
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(router.buffered_frames(), 1);

        router.complete_load("gameio");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unregistered_handler_not_invoked() {
        let router = CommandRouter::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let id = router.register("append_chat", counting_handler(Arc::clone(&counter)));

        assert!(router.unregister(id));
        let outcome = router.dispatch(r#"{"cmd":"append_chat"}"#);

        assert_eq!(outcome, DispatchOutcome::Unhandled);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}

// ============================================================================
// Property Tests
// ============================================================================
