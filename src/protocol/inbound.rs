//! Inbound message types.
//!
//! Inbound frames are JSON objects tagged with a command name:
//!
//! ```json
//! {
//!   "cmd": "append_chat",
//!   "author": "uid-42",
//!   "content": "## hello"
//! }
//! ```
//!
//! A frame is parsed exactly once into an [`InboundMessage`]; the command tag
//! is mandatory and a frame without one is a decode error ([`Error::NoCommand`]),
//! logged and dropped by the router, never dispatched.

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Map, Value};

use crate::error::{Error, Result};

use super::names;

// ============================================================================
// InboundMessage
// ============================================================================

/// A parsed command frame from the server.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Command tag.
    command: String,

    /// Remaining frame fields (the tag key is stripped during parsing).
    fields: Map<String, Value>,
}

impl InboundMessage {
    /// Parses a text frame.
    ///
    /// The command tag is read from the `cmd` key, with `command` accepted
    /// as a fallback; both source variants appear in the wild.
    ///
    /// # Errors
    ///
    /// - [`Error::Decode`] if the frame is not a JSON object
    /// - [`Error::NoCommand`] if the frame has no string command tag
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| Error::decode(format!("invalid JSON frame: {e}")))?;

        let Value::Object(mut fields) = value else {
            return Err(Error::decode("frame is not a JSON object"));
        };

        let tag = fields
            .remove(names::TAG_CMD)
            .or_else(|| fields.remove(names::TAG_COMMAND));

        match tag {
            Some(Value::String(command)) if !command.is_empty() => Ok(Self { command, fields }),
            Some(_) => Err(Error::decode("command tag is empty or not a string")),
            None => Err(Error::NoCommand),
        }
    }

    /// Creates a message directly from parts (tests, synthetic dispatch).
    #[inline]
    #[must_use]
    pub fn from_parts(command: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            command: command.into(),
            fields,
        }
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

    /// Parses the message into a typed variant.
    #[must_use]
    pub fn parse_command(&self) -> ParsedCommand {
        self.parse_internal()
    }
}

// ============================================================================
// Field Accessors
// ============================================================================

impl InboundMessage {
    /// Gets a string field.
    ///
    /// Returns empty string if the key is missing or not a string.
    #[inline]
    #[must_use]
    pub fn get_str(&self, key: &str) -> String {
        self.fields
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }

    /// Gets a string field with a default.
    #[inline]
    #[must_use]
    pub fn get_str_or(&self, key: &str, default: &str) -> String {
        self.fields
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or(default)
            .to_string()
    }

    /// Gets a u64 field.
    ///
    /// Returns 0 if the key is missing or not a number.
    #[inline]
    #[must_use]
    pub fn get_u64(&self, key: &str) -> u64 {
        self.fields
            .get(key)
            .and_then(|v| v.as_u64())
            .unwrap_or_default()
    }

    /// Gets an optional u64 field.
    #[inline]
    #[must_use]
    pub fn get_u64_opt(&self, key: &str) -> Option<u64> {
        self.fields.get(key).and_then(|v| v.as_u64())
    }

    /// Gets a boolean field.
    ///
    /// Returns false if the key is missing or not a boolean.
    #[inline]
    #[must_use]
    pub fn get_bool(&self, key: &str) -> bool {
        self.fields
            .get(key)
            .and_then(|v| v.as_bool())
            .unwrap_or_default()
    }

    /// Gets a raw field value.
    #[inline]
    #[must_use]
    pub fn get_value(&self, key: &str) -> Value {
        self.fields.get(key).cloned().unwrap_or(Value::Null)
    }
}

// ============================================================================
// ParsedCommand
// ============================================================================

/// Typed inbound command variants.
///
/// Handlers that only care about one command can match on this instead of
/// poking at raw fields. Commands this crate does not model parse to
/// [`ParsedCommand::Unknown`]; unknown commands are tolerated by design so
/// older clients keep working against newer servers.
#[derive(Debug, Clone)]
pub enum ParsedCommand {
    /// Append a chat message to the conversation view.
    AppendChat {
        /// Author uid, resolved against the user directory.
        author: String,
        /// Markdown message body.
        content: String,
    },

    /// Store a user profile for author resolution.
    SetUserData {
        /// User id.
        uid: String,
        /// Display name.
        name: String,
        /// Avatar image path.
        icon: String,
    },

    /// Replace the markdown document content.
    UpdateMdContent {
        /// Markdown source.
        content: String,
        /// Which view to show (`source` or `rendered`).
        format: String,
    },

    /// Load and inject a named workspace component bundle.
    WorkspaceComponent {
        /// Component name (e.g. `gameio`).
        name: String,
    },

    /// Enable the file-drop upload channel.
    EnableFileDrop {
        /// Accepted file extensions (with leading dot).
        accept: Vec<String>,
        /// Maximum file size in bytes, unlimited when absent.
        max_size: Option<u64>,
        /// Upload endpoint URL.
        upload_url: String,
        /// Whether multiple files may be uploaded per drop.
        multiple: bool,
        /// Whether to emit `upload_progress` commands.
        progress_updates: bool,
    },

    /// Initialize the game board.
    GameioInit {
        /// Board background image URL.
        board_image: String,
        /// Location map (id → coords).
        locations: Value,
        /// Piece definitions.
        pieces: Value,
    },

    /// Set the moves the user is currently allowed to make.
    GameioAllow {
        /// Allowed move objects, echoed back verbatim in `gameio_move`.
        moves: Value,
    },

    /// Unmodeled command.
    Unknown {
        /// Command tag.
        command: String,
        /// Raw fields.
        fields: Map<String, Value>,
    },
}

// ============================================================================
// Command Parsing Implementation
// ============================================================================

impl InboundMessage {
    /// Internal parsing implementation.
    fn parse_internal(&self) -> ParsedCommand {
        match self.command.as_str() {
            names::APPEND_CHAT => ParsedCommand::AppendChat {
                author: self.get_str("author"),
                content: self.get_str("content"),
            },

            names::SET_USER_DATA => ParsedCommand::SetUserData {
                uid: self.get_str("uid"),
                name: self.get_str("name"),
                icon: self.get_str("icon"),
            },

            names::UPDATE_MD_CONTENT => ParsedCommand::UpdateMdContent {
                content: self.get_str("content"),
                format: self.get_str_or("format", "rendered"),
            },

            names::WORKSPACE_COMPONENT => ParsedCommand::WorkspaceComponent {
                name: self.get_str("name"),
            },

            names::ENABLE_FILE_DROP => ParsedCommand::EnableFileDrop {
                accept: self
                    .get_value("accept")
                    .as_array()
                    .map(|list| {
                        list.iter()
                            .filter_map(|v| v.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default(),
                max_size: self.get_u64_opt("max_size"),
                upload_url: self.get_str("upload_url"),
                multiple: self.get_bool("multiple"),
                progress_updates: self.get_bool("progress_updates"),
            },

            names::GAMEIO_INIT => ParsedCommand::GameioInit {
                board_image: self.get_str("board_image"),
                locations: self.get_value("locations"),
                pieces: self.get_value("pieces"),
            },

            names::GAMEIO_ALLOW => ParsedCommand::GameioAllow {
                moves: self.get_value("moves"),
            },

            _ => ParsedCommand::Unknown {
                command: self.command.clone(),
                fields: self.fields.clone(),
            },
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
