//! Type-safe identifiers for session entities.
//!
//! Newtype wrappers prevent mixing incompatible IDs at compile time.
//!
//! | Type | Backing | Purpose |
//! |------|---------|---------|
//! | [`SocketId`] | UUID v4 | Client-generated identity token correlating the browser session with server-side state |
//! | [`HandlerId`] | u64 counter | Deregistration token for command handlers |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// SocketId
// ============================================================================

/// Opaque client-generated identity token.
///
/// Generated once per session at construction, appended to the connection
/// URL as the `socket_id` query parameter and stamped into every outbound
/// frame. The server uses it to correlate the WebSocket session with
/// side-channel requests such as file uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SocketId(Uuid);

impl SocketId {
    /// Generates a new random identity token.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a socket ID from an existing UUID.
    #[inline]
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// HandlerId
// ============================================================================

/// Registration token for a command handler.
///
/// Returned by handler registration and used to unregister. Closures are
/// not comparable, so deregistration goes through this token instead of
/// the handler value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Global handler ID counter.
static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

impl HandlerId {
    /// Returns the next unique handler ID.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw ID value.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler-{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_id_unique() {
        let a = SocketId::generate();
        let b = SocketId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_socket_id_roundtrip() {
        let id = SocketId::generate();
        let json = serde_json::to_string(&id).expect("serialize");
        let back: SocketId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(id, back);
    }

    #[test]
    fn test_socket_id_serializes_as_plain_string() {
        let id = SocketId::generate();
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, format!("\"{id}\""));
    }

    #[test]
    fn test_handler_id_monotonic() {
        let a = HandlerId::next();
        let b = HandlerId::next();
        assert!(b.as_u64() > a.as_u64());
    }

    #[test]
    fn test_handler_id_display() {
        let id = HandlerId::next();
        assert!(id.to_string().starts_with("handler-"));
    }
}
