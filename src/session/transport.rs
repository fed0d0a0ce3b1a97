//! Transport abstraction and the tokio-tungstenite implementation.
//!
//! A [`Transport`] dials the session URL and yields a split link (a
//! [`FrameSink`] for outbound frames and a [`FrameSource`] for read-side
//! events) that the connection owns exclusively and replaces wholesale on
//! reconnect. The trait seam exists so the connection state machine can be
//! exercised against a scripted in-memory transport in tests.
//!
//! Frames are newline-free UTF-8 text. Binary frames are ignored; ping/pong
//! keepalive is handled inside the WebSocket library.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};
use url::Url;

use crate::error::Result;

// ============================================================================
// Types
// ============================================================================

/// Underlying socket type for the production transport.
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A dialed link: write half and read half.
pub type Link = (Box<dyn FrameSink>, Box<dyn FrameSource>);

// ============================================================================
// TransportEvent
// ============================================================================

/// Read-side lifecycle events produced by a [`FrameSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A complete text frame arrived.
    Frame(String),

    /// The transport reported an error.
    ///
    /// Diagnostic only; errors do not themselves tear the link down.
    /// Reconnect is close-triggered.
    Error(String),

    /// The link closed. `clean` reflects the transport's own clean/unclean
    /// close signal.
    Closed {
        /// Whether the close was graceful.
        clean: bool,
    },
}

// ============================================================================
// FrameSink / FrameSource
// ============================================================================

/// Write half of a live link.
#[async_trait]
pub trait FrameSink: Send {
    /// Hands a text frame to the transport layer.
    ///
    /// Success means hand-off, not delivery; this protocol has no
    /// application-level ack.
    ///
    /// # Errors
    ///
    /// Returns a connection error if the link can no longer accept frames.
    async fn send(&mut self, frame: &str) -> Result<()>;

    /// Closes the link gracefully. Best effort.
    async fn close(&mut self);
}

/// Read half of a live link.
#[async_trait]
pub trait FrameSource: Send {
    /// Waits for the next read-side event.
    ///
    /// After [`TransportEvent::Closed`] is returned the source is spent;
    /// the caller drops both halves.
    async fn next_event(&mut self) -> TransportEvent;
}

// ============================================================================
// Transport
// ============================================================================

/// Factory for live links.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Dials the session URL.
    ///
    /// # Errors
    ///
    /// Returns a connection error if the dial fails; the caller treats a
    /// failed dial like an unclean close and retries after the reconnect
    /// delay.
    async fn connect(&self, url: &Url) -> Result<Link>;
}

// ============================================================================
// WsTransport
// ============================================================================

/// Production transport backed by tokio-tungstenite.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsTransport;

impl WsTransport {
    /// Creates the production transport.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, url: &Url) -> Result<Link> {
        let (stream, response) = connect_async(url.as_str()).await?;
        debug!(url = %url, status = %response.status(), "WebSocket handshake completed");

        let (write, read) = stream.split();
        Ok((Box::new(WsSink { write }), Box::new(WsSource { read })))
    }
}

// ============================================================================
// WsSink / WsSource
// ============================================================================

/// Write half of a live tungstenite socket.
struct WsSink {
    write: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, frame: &str) -> Result<()> {
        self.write.send(Message::Text(frame.into())).await?;
        Ok(())
    }

    async fn close(&mut self) {
        let _ = self.write.close().await;
    }
}

/// Read half of a live tungstenite socket.
struct WsSource {
    read: SplitStream<WsStream>,
}

#[async_trait]
impl FrameSource for WsSource {
    async fn next_event(&mut self) -> TransportEvent {
        loop {
            match self.read.next().await {
                Some(Ok(Message::Text(text))) => {
                    return TransportEvent::Frame(text.to_string());
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "WebSocket closed by remote");
                    return TransportEvent::Closed { clean: true };
                }
                Some(Ok(other)) => {
                    // Binary, ping, pong: nothing to route.
                    trace!(kind = ?other, "ignoring non-text frame");
                }
                Some(Err(error)) => {
                    return TransportEvent::Error(error.to_string());
                }
                None => {
                    return TransportEvent::Closed { clean: false };
                }
            }
        }
    }
}

// ============================================================================
// Test Support
// ============================================================================


// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::testing::{MockTransport, Script};
    use super::*;

    #[tokio::test]
    async fn test_mock_transport_replays_script_in_order() {
        let (open, events) = MockTransport::open_script();
        let transport = MockTransport::new(vec![Script::Fail, open]);
        let url = Url::parse("ws://localhost/ws").expect("url");

        assert!(transport.connect(&url).await.is_err());

        let (_sink, mut source) = transport.connect(&url).await.expect("second dial opens");
        events
            .send(TransportEvent::Frame("{}".into()))
            .expect("push event");

        assert_eq!(
            source.next_event().await,
            TransportEvent::Frame("{}".into())
        );
        assert_eq!(transport.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_sink_records_sent_frames() {
        let (open, _events) = MockTransport::open_script();
        let transport = MockTransport::new(vec![open]);
        let url = Url::parse("ws://localhost/ws").expect("url");

        let (mut sink, _source) = transport.connect(&url).await.expect("dial");
        sink.send("first").await.expect("send");
        sink.send("second").await.expect("send");

        assert_eq!(*transport.sent.lock(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_dropped_script_sender_is_unclean_close() {
        let (open, events) = MockTransport::open_script();
        let transport = MockTransport::new(vec![open]);
        let url = Url::parse("ws://localhost/ws").expect("url");

        let (_sink, mut source) = transport.connect(&url).await.expect("dial");
        drop(events);

        assert_eq!(
            source.next_event().await,
            TransportEvent::Closed { clean: false }
        );
    }
}
