//! File-upload side channel.
//!
//! Uploads travel over plain HTTP, not the WebSocket: a multipart POST to a
//! server-supplied URL, tagged with the session's identity token so the
//! server can correlate the upload with the WebSocket session. The WebSocket
//! only carries the bracketing notifications (`upload_progress`,
//! `upload_complete`, `upload_error`).
//!
//! The server enables the channel with an `enable_file_drop` command carrying
//! the accepted extensions, size limit and endpoint; files failing those
//! checks are rejected locally and never leave the machine.

// ============================================================================
// Imports
// ============================================================================

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identifiers::HandlerId;
use crate::protocol::{Command, InboundMessage, ParsedCommand, names};
use crate::session::Session;

// ============================================================================
// Constants
// ============================================================================

/// Multipart field name carrying the file content.
const UPLOAD_FILE_FIELD: &str = "file";

/// Chunk size between progress notifications.
const PROGRESS_CHUNK: usize = 64 * 1024;

// ============================================================================
// DropConfig
// ============================================================================

/// Active file-drop configuration, as supplied by `enable_file_drop`.
#[derive(Debug, Clone, PartialEq)]
pub struct DropConfig {
    /// Accepted file extensions, with leading dot. Empty accepts nothing.
    pub accept: Vec<String>,
    /// Maximum file size in bytes; unlimited when absent.
    pub max_size: Option<u64>,
    /// Upload endpoint URL.
    pub upload_url: String,
    /// Whether multiple files may be uploaded per drop.
    pub multiple: bool,
    /// Whether to emit `upload_progress` commands while transferring.
    pub progress_updates: bool,
}

impl DropConfig {
    /// Extracts the configuration from an `enable_file_drop` message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the message is not `enable_file_drop`
    /// or carries no upload URL.
    pub fn from_message(message: &InboundMessage) -> Result<Self> {
        let ParsedCommand::EnableFileDrop {
            accept,
            max_size,
            upload_url,
            multiple,
            progress_updates,
        } = message.parse_command()
        else {
            return Err(Error::decode("not an enable_file_drop message"));
        };

        if upload_url.is_empty() {
            return Err(Error::decode("enable_file_drop without upload_url"));
        }

        Ok(Self {
            accept,
            max_size,
            upload_url,
            multiple,
            progress_updates,
        })
    }

    /// Checks a candidate file against the accepted extensions and size
    /// limit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UploadRejected`] naming the failed check.
    pub fn validate(&self, file_name: &str, size: u64) -> Result<()> {
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| format!(".{}", ext.to_ascii_lowercase()));

        let accepted = extension
            .as_deref()
            .is_some_and(|ext| self.accept.iter().any(|a| a.eq_ignore_ascii_case(ext)));

        if !accepted {
            return Err(Error::upload_rejected(
                file_name,
                format!(
                    "extension {} not in accepted set",
                    extension.as_deref().unwrap_or("(none)")
                ),
            ));
        }

        if let Some(max) = self.max_size
            && size > max
        {
            return Err(Error::upload_rejected(
                file_name,
                format!("size {size} exceeds limit {max}"),
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Uploader
// ============================================================================

/// Uploads dropped files through the HTTP side channel.
pub struct Uploader {
    /// Session providing the identity token and the notification path.
    session: Arc<Session>,
    /// HTTP client, reused across uploads.
    client: Client,
    /// Configuration from the most recent `enable_file_drop`.
    config: Mutex<Option<DropConfig>>,
    /// Registration token for `detach`.
    handler: Mutex<Option<HandlerId>>,
}

impl Uploader {
    /// Creates an uploader bound to a session.
    #[must_use]
    pub fn new(session: Arc<Session>) -> Arc<Self> {
        Arc::new(Self {
            session,
            client: Client::new(),
            config: Mutex::new(None),
            handler: Mutex::new(None),
        })
    }

    /// Registers the `enable_file_drop` handler.
    pub fn attach(self: &Arc<Self>) {
        let uploader = Arc::clone(self);
        let id = self.session.router().register(
            names::ENABLE_FILE_DROP,
            Arc::new(move |msg| {
                let config = DropConfig::from_message(msg)?;
                debug!(url = %config.upload_url, "file drop enabled");
                *uploader.config.lock() = Some(config);
                Ok(())
            }),
        );

        *self.handler.lock() = Some(id);
    }

    /// Unregisters the `enable_file_drop` handler.
    pub fn detach(&self) {
        if let Some(id) = self.handler.lock().take() {
            self.session.router().unregister(id);
        }
    }

    /// Returns the active drop configuration, if any.
    #[must_use]
    pub fn config(&self) -> Option<DropConfig> {
        self.config.lock().clone()
    }

    /// Uploads one file to the configured endpoint.
    ///
    /// Validates the file locally, POSTs it as multipart form data tagged
    /// with the identity token, and brackets the transfer with
    /// `upload_progress`/`upload_complete`/`upload_error` commands over the
    /// session.
    ///
    /// # Errors
    ///
    /// - [`Error::Upload`] if file drop is not enabled or the POST fails
    /// - [`Error::UploadRejected`] if the file fails the configured checks
    /// - [`Error::Io`] if the file cannot be read
    pub async fn upload(&self, path: &Path) -> Result<()> {
        let Some(config) = self.config() else {
            return Err(Error::upload("file drop is not enabled"));
        };

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| Error::upload("path has no file name"))?;

        let metadata = tokio::fs::metadata(path).await?;
        config.validate(&file_name, metadata.len())?;

        let bytes = tokio::fs::read(path).await?;
        let total = bytes.len() as u64;
        debug!(file = %file_name, total, url = %config.upload_url, "uploading");

        let part = self
            .file_part(&config, &file_name, bytes, total)
            .file_name(file_name.clone());

        let form = Form::new()
            .part(UPLOAD_FILE_FIELD, part)
            .text(names::TAG_SOCKET_ID, self.session.socket_id().to_string());

        let posted = async {
            let response = self
                .client
                .post(&config.upload_url)
                .multipart(form)
                .send()
                .await?;
            response.error_for_status()?;
            Ok::<(), Error>(())
        }
        .await;

        match posted {
            Ok(()) => {
                self.notify(Command::UploadComplete {
                    file: file_name.clone(),
                });
                debug!(file = %file_name, "upload complete");
                Ok(())
            }
            Err(error) => {
                let message = error.to_string();
                self.notify(Command::UploadError {
                    file: file_name.clone(),
                    message: message.clone(),
                });
                warn!(file = %file_name, %message, "upload failed");
                Err(Error::upload(message))
            }
        }
    }

    /// Builds the multipart file part, streaming with progress notifications
    /// when the configuration asks for them.
    fn file_part(
        &self,
        config: &DropConfig,
        file_name: &str,
        bytes: Vec<u8>,
        total: u64,
    ) -> Part {
        if !config.progress_updates {
            return Part::bytes(bytes);
        }

        let mut sent = 0u64;
        let chunks: Vec<(Vec<u8>, u64)> = bytes
            .chunks(PROGRESS_CHUNK)
            .map(|chunk| {
                sent += chunk.len() as u64;
                (chunk.to_vec(), sent)
            })
            .collect();

        let session = Arc::clone(&self.session);
        let file = file_name.to_string();
        let stream = futures_util::stream::iter(chunks.into_iter().map(move |(chunk, sent)| {
            if let Err(error) = session.send(Command::UploadProgress {
                file: file.clone(),
                sent,
                total,
            }) {
                debug!(%error, "progress notification dropped");
            }
            Ok::<Vec<u8>, std::io::Error>(chunk)
        }));

        Part::stream_with_length(Body::wrap_stream(stream), total)
    }

    /// Sends a bracketing notification, tolerating a stopped session.
    fn notify(&self, command: Command) {
        if let Err(error) = self.session.send(command) {
            warn!(%error, "upload notification dropped");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
