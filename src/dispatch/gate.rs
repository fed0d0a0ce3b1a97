//! Dependency gate: admission control for inbound dispatch.
//!
//! Some inbound commands name a workspace component that must be fetched and
//! initialized asynchronously before the command can be meaningfully handled
//! (a board command can arrive before the board component has loaded).
//! While any named load is outstanding, inbound frames are held in a FIFO
//! buffer instead of being dispatched; once the pending set empties, the
//! buffer flushes in original arrival order.
//!
//! # State machine
//!
//! | State | Frame arrives | `begin_load` | `complete_load` (last) |
//! |-------|---------------|--------------|------------------------|
//! | open, idle | dispatch now | → gated | no-op |
//! | gated | buffer | add name | → flush buffer FIFO |
//! | flushing | buffer behind held frames | flush stops, remainder held | no-op |
//!
//! The `dispatching` flag serializes all dispatch through one logical drain
//! so total dispatch order always equals arrival order, and makes the flush
//! re-entrancy safe: a handler calling `begin_load` mid-flush closes the gate
//! and the remainder stays buffered (no frame is ever dispatched while the
//! pending set is non-empty).

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::protocol::InboundMessage;

// ============================================================================
// Admission
// ============================================================================

/// Outcome of offering a frame to the gate.
#[derive(Debug)]
pub(crate) enum Admission {
    /// Caller holds the dispatch baton; invoke now, then drain.
    Dispatch(InboundMessage),
    /// Frame was buffered behind pending loads or an active drain.
    Buffered,
}

// ============================================================================
// GateState
// ============================================================================

/// Interior state, guarded by one mutex.
struct GateState {
    /// Names of resources currently loading.
    pending: FxHashSet<String>,
    /// Frames held while the gate is closed, in arrival order.
    buffer: VecDeque<InboundMessage>,
    /// A dispatch/drain is in progress somewhere above us.
    dispatching: bool,
}

// ============================================================================
// DependencyGate
// ============================================================================

/// Admission control for inbound dispatch.
///
/// Locks are never held across handler invocation; the router pulls one
/// frame at a time via [`next_buffered`](Self::next_buffered).
pub struct DependencyGate {
    state: Mutex<GateState>,
}

impl Default for DependencyGate {
    fn default() -> Self {
        Self::new()
    }
}

impl DependencyGate {
    /// Creates an open gate with no pending loads.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState {
                pending: FxHashSet::default(),
                buffer: VecDeque::new(),
                dispatching: false,
            }),
        }
    }

    /// Marks a named resource as loading; subsequent frames buffer until
    /// every pending name resolves.
    ///
    /// Returns `false` for a duplicate begin (already pending), which is
    /// logged and otherwise ignored.
    pub fn begin_load(&self, name: &str) -> bool {
        let mut state = self.state.lock();
        let added = state.pending.insert(name.to_string());

        if added {
            debug!(name, pending = state.pending.len(), "dependency load started");
        } else {
            warn!(name, "duplicate dependency load ignored");
        }

        added
    }

    /// Resolves a named resource. Success and failure resolve alike: a
    /// failed load must still release the gate.
    ///
    /// Returns `true` if this call emptied the pending set. Completing a
    /// name that is not pending is an idempotent no-op.
    pub fn complete_load(&self, name: &str) -> bool {
        let mut state = self.state.lock();

        if !state.pending.remove(name) {
            debug!(name, "complete_load for non-pending name ignored");
            return false;
        }

        let emptied = state.pending.is_empty();
        debug!(
            name,
            pending = state.pending.len(),
            buffered = state.buffer.len(),
            "dependency load resolved"
        );
        emptied
    }

    /// Number of outstanding loads.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Number of frames currently held.
    #[inline]
    #[must_use]
    pub fn buffered_count(&self) -> usize {
        self.state.lock().buffer.len()
    }

    /// Returns `true` if no loads are outstanding.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.lock().pending.is_empty()
    }

    /// Offers a freshly arrived frame.
    ///
    /// The frame buffers if the gate is closed, a drain is already running,
    /// or older frames are still held (arrival order is absolute). Otherwise
    /// the caller takes the dispatch baton and must call
    /// [`next_buffered`](Self::next_buffered) until it returns `None`.
    pub(crate) fn admit(&self, message: InboundMessage) -> Admission {
        let mut state = self.state.lock();

        if !state.pending.is_empty() || state.dispatching || !state.buffer.is_empty() {
            state.buffer.push_back(message);
            Admission::Buffered
        } else {
            state.dispatching = true;
            Admission::Dispatch(message)
        }
    }

    /// Pulls the next held frame while draining.
    ///
    /// Returns `None`, releasing the dispatch baton, when the buffer is
    /// exhausted or a load re-opened mid-drain.
    pub(crate) fn next_buffered(&self) -> Option<InboundMessage> {
        let mut state = self.state.lock();
        debug_assert!(state.dispatching, "next_buffered without the dispatch baton");

        if state.pending.is_empty()
            && let Some(message) = state.buffer.pop_front()
        {
            return Some(message);
        }

        state.dispatching = false;
        None
    }

    /// Claims the dispatch baton to flush held frames after the pending set
    /// emptied. Returns `false` if a drain is already running (the active
    /// drain will pick the frames up) or there is nothing to flush.
    pub(crate) fn try_begin_drain(&self) -> bool {
        let mut state = self.state.lock();

        if state.dispatching || !state.pending.is_empty() || state.buffer.is_empty() {
            return false;
        }

        state.dispatching = true;
        true
    }
}

// ============================================================================
// Tests
// ============================================================================
