//! Outbound message types.
//!
//! Outbound frames are JSON objects carrying the command tag, the session's
//! identity token, and command-specific fields at the top level:
//!
//! ```json
//! {
//!   "cmd": "chat_input",
//!   "socket_id": "550e8400-e29b-41d4-a716-446655440000",
//!   "content": "hello"
//! }
//! ```
//!
//! The identity token is stamped at serialization time, not at construction:
//! a message is immutable once built and owned by the outbound queue or the
//! transport from the moment it is sent.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::SocketId;

use super::names;

// ============================================================================
// OutboundMessage
// ============================================================================

/// A command message bound for the server.
///
/// Immutable once constructed. Ownership transfers to the outbound queue
/// (while disconnected) or the transport (while open) on send.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    /// Command tag.
    command: String,

    /// Command-specific fields, serialized at the top level of the frame.
    fields: Map<String, Value>,
}

impl OutboundMessage {
    /// Creates a new outbound message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `fields` contains a key reserved for the
    /// envelope (`cmd`, `command`, `socket_id`).
    pub fn new(command: impl Into<String>, fields: Map<String, Value>) -> Result<Self> {
        for reserved in [names::TAG_CMD, names::TAG_COMMAND, names::TAG_SOCKET_ID] {
            if fields.contains_key(reserved) {
                return Err(Error::config(format!(
                    "payload key '{reserved}' is reserved for the frame envelope"
                )));
            }
        }

        Ok(Self {
            command: command.into(),
            fields,
        })
    }

    /// Creates a message with no payload fields.
    #[inline]
    #[must_use]
    pub fn bare(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            fields: Map::new(),
        }
    }

    /// Creates a message from a typed [`Command`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the command fails to serialize.
    pub fn from_command(command: Command) -> Result<Self> {
        let value = serde_json::to_value(&command)?;

        let Value::Object(mut fields) = value else {
            return Err(Error::config("command did not serialize to an object"));
        };

        let Some(Value::String(tag)) = fields.remove(names::TAG_CMD) else {
            return Err(Error::config("command serialized without a cmd tag"));
        };

        Ok(Self {
            command: tag,
            fields,
        })
    }

    /// Returns the command tag.
    #[inline]
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Returns the payload fields.
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Serializes the message to a text frame, stamped with the identity token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_frame(&self, socket_id: &SocketId) -> Result<String> {
        let mut object = Map::with_capacity(self.fields.len() + 2);
        object.insert(names::TAG_CMD.to_string(), Value::String(self.command.clone()));
        object.insert(
            names::TAG_SOCKET_ID.to_string(),
            Value::String(socket_id.to_string()),
        );
        for (key, value) in &self.fields {
            object.insert(key.clone(), value.clone());
        }

        Ok(serde_json::to_string(&Value::Object(object))?)
    }
}

impl TryFrom<Command> for OutboundMessage {
    type Error = Error;

    fn try_from(command: Command) -> Result<Self> {
        Self::from_command(command)
    }
}

// ============================================================================
// Command
// ============================================================================

/// Typed outbound commands.
///
/// Covers the commands this client emits; ad hoc commands go through
/// [`OutboundMessage::new`] directly.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// User chat input.
    ChatInput {
        /// Raw chat text (markdown rendered server-side or by peers).
        content: String,
    },

    /// Request the current markdown document content.
    ///
    /// Sent on open by document views so a reconnect repopulates them.
    RequestMdContent,

    /// A board move chosen by the user, echoing one of the allowed moves.
    GameioMove {
        /// Piece identifier.
        piece: String,
        /// Source location, absent for placements.
        #[serde(rename = "from", skip_serializing_if = "Option::is_none")]
        origin: Option<String>,
        /// Destination location.
        dest: String,
    },

    /// Upload progress notification for a file transfer in flight.
    UploadProgress {
        /// File name being uploaded.
        file: String,
        /// Bytes sent so far.
        sent: u64,
        /// Total bytes.
        total: u64,
    },

    /// Upload finished successfully.
    UploadComplete {
        /// File name that finished.
        file: String,
    },

    /// Upload failed.
    UploadError {
        /// File name that failed.
        file: String,
        /// Failure description.
        message: String,
    },
}

impl Command {
    /// Returns the wire name of this command.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ChatInput { .. } => names::CHAT_INPUT,
            Self::RequestMdContent => names::REQUEST_MD_CONTENT,
            Self::GameioMove { .. } => names::GAMEIO_MOVE,
            Self::UploadProgress { .. } => names::UPLOAD_PROGRESS,
            Self::UploadComplete { .. } => names::UPLOAD_COMPLETE,
            Self::UploadError { .. } => names::UPLOAD_ERROR,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn fields(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_frame_carries_cmd_and_token() {
        let socket_id = SocketId::generate();
        let message = OutboundMessage::new("chat_input", fields(&[("content", json!("hi"))]))
            .expect("valid message");

        let frame = message.to_frame(&socket_id).expect("serialize");
        let value: Value = serde_json::from_str(&frame).expect("frame is json");

        assert_eq!(value["cmd"], "chat_input");
        assert_eq!(value["socket_id"], socket_id.to_string());
        assert_eq!(value["content"], "hi");
    }

    #[test]
    fn test_reserved_keys_rejected() {
        for key in ["cmd", "command", "socket_id"] {
            let result = OutboundMessage::new("chat_input", fields(&[(key, json!("x"))]));
            assert!(result.is_err(), "key {key} should be rejected");
        }
    }

    #[test]
    fn test_bare_message() {
        let message = OutboundMessage::bare("request_md_content");
        assert_eq!(message.command(), "request_md_content");
        assert!(message.fields().is_empty());
    }

    #[test]
    fn test_typed_command_conversion() {
        let message = OutboundMessage::from_command(Command::ChatInput {
            content: "hello".into(),
        })
        .expect("convert");

        assert_eq!(message.command(), "chat_input");
        assert_eq!(message.fields()["content"], "hello");
    }

    #[test]
    fn test_unit_command_conversion() {
        let message =
            OutboundMessage::from_command(Command::RequestMdContent).expect("convert");
        assert_eq!(message.command(), "request_md_content");
        assert!(message.fields().is_empty());
    }

    #[test]
    fn test_gameio_move_serialization() {
        let message = OutboundMessage::from_command(Command::GameioMove {
            piece: "red".into(),
            origin: Some("a1".into()),
            dest: "a2".into(),
        })
        .expect("convert");

        assert_eq!(message.command(), "gameio_move");
        assert_eq!(message.fields()["from"], "a1");
        assert_eq!(message.fields()["dest"], "a2");
    }

    #[test]
    fn test_gameio_placement_omits_from() {
        let message = OutboundMessage::from_command(Command::GameioMove {
            piece: "red".into(),
            origin: None,
            dest: "a2".into(),
        })
        .expect("convert");

        assert!(!message.fields().contains_key("from"));
    }

    #[test]
    fn test_command_names() {
        assert_eq!(
            Command::ChatInput { content: String::new() }.name(),
            "chat_input"
        );
        assert_eq!(Command::RequestMdContent.name(), "request_md_content");
    }
}
