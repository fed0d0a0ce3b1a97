//! Chatspace - WebSocket session and command dispatch for chat/game
//! workspace clients.
//!
//! This library is the protocol core of a chat/game workspace UI: one
//! WebSocket connection to the backend, command frames routed to registered
//! handlers, outbound messages queued across disconnects, and inbound
//! dispatch gated while dynamically loaded workspace components initialize.
//! Rendering (markdown, boards, tabs) stays with the embedder; it shows up
//! here only as the commands it sends and receives.
//!
//! # Architecture
//!
//! - One [`Session`] per page, built once and shared by reference
//! - Identity token ([`SocketId`]) stamped into every outbound frame and the
//!   connection URL, correlating uploads with the WebSocket session
//! - Frames are JSON objects tagged with a `cmd` string; unknown commands
//!   are tolerated so older clients keep working against newer servers
//! - Event-driven: a single connection task multiplexes socket I/O, sends
//!   and the reconnect timer
//!
//! # Quick Start
//!
//! ```no_run
//! use chatspace::{Command, Result, Session};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let session = Arc::new(
//!         Session::builder()
//!             .origin("https://play.example.com")
//!             .build()?,
//!     );
//!
//!     session.register(
//!         "append_chat",
//!         Arc::new(|msg| {
//!             println!("{}: {}", msg.get_str("author"), msg.get_str("content"));
//!             Ok(())
//!         }),
//!     );
//!
//!     session.connect();
//!     session.send(Command::ChatInput { content: "hello".into() })?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`dispatch`] | Command router, handler registry, dependency gate |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire message types |
//! | [`session`] | Connection lifecycle, reconnection, the [`Session`] facade |
//! | [`upload`] | Multipart file-upload side channel |
//! | [`users`] | User profile directory |
//! | [`workspace`] | Component load admission control |

// ============================================================================
// Modules
// ============================================================================

/// Inbound command dispatch.
///
/// Routes decoded frames to registered handlers, isolating handler
/// failures, and holds frames while component loads are pending.
pub mod dispatch;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for session entities.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Wire protocol message types.
///
/// Outbound/inbound command frames and the wire-name constants.
pub mod protocol;

/// WebSocket session layer.
///
/// Connection lifecycle, outbound queuing, reconnection and the
/// [`Session`] facade.
pub mod session;

/// File-upload side channel.
///
/// Multipart HTTP uploads correlated with the session by identity token.
pub mod upload;

/// User profile directory.
///
/// Stores `set_user_data` profiles with a default-avatar fallback.
pub mod users;

/// Workspace component admission.
///
/// Gates inbound dispatch while named component bundles load.
pub mod workspace;

// ============================================================================
// Re-exports
// ============================================================================

// Dispatch types
pub use dispatch::{CommandRouter, DependencyGate, DispatchOutcome, Handler, HandlerRegistry};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{HandlerId, SocketId};

// Protocol types
pub use protocol::{Command, InboundMessage, OutboundMessage, ParsedCommand};

// Session types
pub use session::{
    Connection, ConnectionState, DEFAULT_RECONNECT_DELAY, LifecycleHandler, Session,
    SessionBuilder, SessionEvent, Transport, TransportEvent, WsTransport,
};

// Upload types
pub use upload::{DropConfig, Uploader};

// User directory types
pub use users::{UserDirectory, UserProfile};

// Workspace types
pub use workspace::{ComponentLoader, ComponentManager, DEFAULT_LOAD_TIMEOUT};
