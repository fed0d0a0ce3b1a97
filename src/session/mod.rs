//! WebSocket session layer.
//!
//! This module owns the connection to the server: URL derivation, the
//! transport seam, the reconnecting event loop and the [`Session`] facade
//! the page holds on to.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐                      ┌─────────────────┐
//! │ Session                  │                      │  Server         │
//! │  ├─ SocketId             │      WebSocket       │                 │
//! │  ├─ CommandRouter        │◄────────────────────►│  /ws?socket_id= │
//! │  └─ Connection ──► link  │   text JSON frames   │                 │
//! └──────────────────────────┘                      └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. [`Session::builder`] - derive endpoint from the page origin
//! 2. [`Session::connect`] - spawn the event loop and dial
//! 3. Sends queue while disconnected, replay FIFO on open
//! 4. Close events schedule a single fixed-delay reconnect
//! 5. [`Session::close`] - terminal stop, no further reconnects
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | Fluent session configuration |
//! | `connection` | Event loop, outbound queue, reconnect timer |
//! | `core` | The [`Session`] facade |
//! | `transport` | Transport seam and tungstenite implementation |
//! | `url` | Endpoint derivation from the page origin |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent session configuration.
pub mod builder;

/// Connection lifecycle and reconnection.
pub mod connection;

/// Session facade.
pub mod core;

/// Transport abstraction.
pub mod transport;

/// Session URL derivation.
pub mod url;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::SessionBuilder;
pub use connection::{
    Connection, ConnectionState, DEFAULT_RECONNECT_DELAY, LifecycleHandler, SessionEvent,
};
pub use self::core::Session;
pub use self::url::session_url;
pub use transport::{FrameSink, FrameSource, Transport, TransportEvent, WsTransport};
