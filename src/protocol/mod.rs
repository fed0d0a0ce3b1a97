//! Wire protocol message types.
//!
//! This module defines the frame format exchanged with the server over the
//! WebSocket session.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | [`OutboundMessage`] | Client → Server | Command, stamped with the identity token |
//! | [`InboundMessage`] | Server → Client | Command, routed by tag to handlers |
//!
//! Frames are newline-free UTF-8 text, each a JSON object with a mandatory
//! command tag (`cmd`, with `command` accepted inbound) and arbitrary
//! additional fields specific to that command. There is no request/response
//! correlation; both directions are independent command streams.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `outbound` | [`OutboundMessage`] and the typed [`Command`] enum |
//! | `inbound` | [`InboundMessage`] and the typed [`ParsedCommand`] view |
//! | `names` | Wire-name constants for every modeled command |

// ============================================================================
// Submodules
// ============================================================================

/// Inbound message types.
pub mod inbound;

/// Outbound message types.
pub mod outbound;

// ============================================================================
// Re-exports
// ============================================================================

pub use inbound::{InboundMessage, ParsedCommand};
pub use outbound::{Command, OutboundMessage};

// ============================================================================
// Command Names
// ============================================================================

/// Wire names for commands and envelope keys.
pub mod names {
    /// Primary command tag key.
    pub const TAG_CMD: &str = "cmd";
    /// Fallback command tag key accepted on inbound frames.
    pub const TAG_COMMAND: &str = "command";
    /// Identity token key stamped into outbound frames.
    pub const TAG_SOCKET_ID: &str = "socket_id";

    // ------------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------------

    /// User chat input.
    pub const CHAT_INPUT: &str = "chat_input";
    /// Request the current markdown document.
    pub const REQUEST_MD_CONTENT: &str = "request_md_content";
    /// Board move chosen by the user.
    pub const GAMEIO_MOVE: &str = "gameio_move";
    /// Upload progress notification.
    pub const UPLOAD_PROGRESS: &str = "upload_progress";
    /// Upload finished.
    pub const UPLOAD_COMPLETE: &str = "upload_complete";
    /// Upload failed.
    pub const UPLOAD_ERROR: &str = "upload_error";

    // ------------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------------

    /// Append a chat message.
    pub const APPEND_CHAT: &str = "append_chat";
    /// Store a user profile.
    pub const SET_USER_DATA: &str = "set_user_data";
    /// Replace markdown document content.
    pub const UPDATE_MD_CONTENT: &str = "update_md_content";
    /// Load a workspace component bundle.
    pub const WORKSPACE_COMPONENT: &str = "workspace_component";
    /// Enable the file-drop upload channel.
    pub const ENABLE_FILE_DROP: &str = "enable_file_drop";
    /// Initialize the game board.
    pub const GAMEIO_INIT: &str = "gameio_init";
    /// Set the allowed moves.
    pub const GAMEIO_ALLOW: &str = "gameio_allow";
}
