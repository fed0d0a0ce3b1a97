//! Connection lifecycle and reconnection.
//!
//! One connection per page session. The connection owns the live transport
//! link exclusively, replaces it wholesale on every reconnect, and runs a
//! single event-loop task that multiplexes:
//!
//! - read-side transport events (frames, errors, closes)
//! - outbound send requests from the API
//! - the reconnect timer
//!
//! # State machine
//!
//! ```text
//! Connecting ──► Open ──► Closed(clean | error) ──► Connecting (after delay)
//!                  │                 │
//!                  └──── stop ───────┴──► Stopped (terminal)
//! ```
//!
//! Sends issued while the connection is not open append to an unbounded FIFO
//! queue; on open the queue drains in original order before any newer message
//! is sent, each entry removed only after successful hand-off to the
//! transport. The reconnect timer is single-shot with a fixed delay; there
//! is exactly one timer pending at a time no matter how many close events
//! fire. Transport errors are surfaced as lifecycle events and do not
//! themselves trigger reconnection; reconnect is close-triggered, and a
//! failed dial counts as an unclean close.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use crate::dispatch::CommandRouter;
use crate::error::{Error, Result};
use crate::identifiers::SocketId;
use crate::protocol::OutboundMessage;

use super::transport::{FrameSink, FrameSource, Transport, TransportEvent};

// ============================================================================
// Constants
// ============================================================================

/// Fixed delay between a close and the reconnect attempt.
///
/// No exponential backoff and no attempt cap; the server being away for a
/// while just means a dial every two seconds until it returns.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(2000);

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Dial in progress.
    Connecting,
    /// Live link established; sends go straight to the transport.
    Open,
    /// Link lost; a reconnect timer is pending and sends are queued.
    Closed,
    /// Explicitly stopped; terminal, no further reconnects.
    Stopped,
}

// ============================================================================
// SessionEvent
// ============================================================================

/// Lifecycle notifications surfaced to the embedding UI.
///
/// Transport faults are passive notices (a log line, a system chat entry),
/// never fatal to the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Connection established; the outbound queue is about to drain.
    Opened,
    /// Connection lost. `clean` reflects the transport's close signal.
    Closed {
        /// Whether the close was graceful.
        clean: bool,
    },
    /// Transport-level error with a diagnostic payload.
    Error(String),
}

/// Lifecycle event callback type.
pub type LifecycleHandler = Box<dyn Fn(&SessionEvent) + Send + Sync>;

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Transmit (or queue) an outbound message.
    Send(OutboundMessage),
    /// Stop permanently; cancels any pending reconnect.
    Stop,
}

// ============================================================================
// ConnectionConfig
// ============================================================================

/// Everything the event loop needs, assembled by the session builder.
pub(crate) struct ConnectionConfig {
    /// Derived session URL (scheme swapped, `/ws` path, token query).
    pub url: Url,
    /// Identity token stamped into every outbound frame.
    pub socket_id: SocketId,
    /// Link factory.
    pub transport: Arc<dyn Transport>,
    /// Inbound frame sink.
    pub router: Arc<CommandRouter>,
    /// Delay between close and redial.
    pub reconnect_delay: Duration,
    /// Lifecycle callback slot, shared with the session facade.
    pub lifecycle: Arc<Mutex<Option<LifecycleHandler>>>,
}

// ============================================================================
// Connection
// ============================================================================

/// Handle to the connection event loop.
///
/// Cheap to clone; all clones drive the same loop.
#[derive(Clone)]
pub struct Connection {
    /// Channel into the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Observable lifecycle state.
    state: Arc<Mutex<ConnectionState>>,
    /// Depth of the disconnected-send queue.
    queued: Arc<AtomicUsize>,
}

impl Connection {
    /// Spawns the event loop and dials immediately.
    pub(crate) fn spawn(config: ConnectionConfig) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(ConnectionState::Connecting));
        let queued = Arc::new(AtomicUsize::new(0));

        tokio::spawn(Self::run_loop(
            config,
            Arc::clone(&state),
            Arc::clone(&queued),
            command_rx,
        ));

        Self {
            command_tx,
            state,
            queued,
        }
    }

    /// Sends a message, queueing it if the connection is not open.
    ///
    /// Never blocks: control returns as soon as the message is handed to the
    /// event loop.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionStopped`] once the connection has stopped.
    pub fn send(&self, message: OutboundMessage) -> Result<()> {
        self.command_tx
            .send(ConnectionCommand::Send(message))
            .map_err(|_| Error::SessionStopped)
    }

    /// Stops the connection permanently.
    ///
    /// Cancels any pending reconnect timer and transitions to the terminal
    /// [`ConnectionState::Stopped`] state. Queued messages are discarded.
    pub fn stop(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Stop);
    }

    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Returns the number of messages waiting for a reconnect.
    #[inline]
    #[must_use]
    pub fn queued_count(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Connection - Event Loop
// ============================================================================

impl Connection {
    /// Outer loop: dial, run while open, wait out the reconnect delay.
    async fn run_loop(
        config: ConnectionConfig,
        state: Arc<Mutex<ConnectionState>>,
        queued: Arc<AtomicUsize>,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
    ) {
        let mut queue: VecDeque<OutboundMessage> = VecDeque::new();

        loop {
            Self::set_state(&state, ConnectionState::Connecting);
            debug!(url = %config.url, "dialing session endpoint");

            match config.transport.connect(&config.url).await {
                Ok((mut sink, mut source)) => {
                    Self::set_state(&state, ConnectionState::Open);
                    info!(socket_id = %config.socket_id, "session connected");
                    Self::emit(&config.lifecycle, &SessionEvent::Opened);

                    Self::drain_queue(&config, &mut queue, &queued, sink.as_mut()).await;

                    let stopped = Self::run_open(
                        &config,
                        &state,
                        &mut queue,
                        &queued,
                        sink.as_mut(),
                        source.as_mut(),
                        &mut command_rx,
                    )
                    .await;

                    if stopped {
                        sink.close().await;
                        Self::finish(&state, &queue);
                        return;
                    }
                }
                Err(error) => {
                    warn!(%error, "dial failed");
                    Self::emit(&config.lifecycle, &SessionEvent::Error(error.to_string()));
                    Self::set_state(&state, ConnectionState::Closed);
                    Self::emit(&config.lifecycle, &SessionEvent::Closed { clean: false });
                }
            }

            // Single-shot reconnect timer; sends issued meanwhile are queued.
            let timer = sleep(config.reconnect_delay);
            tokio::pin!(timer);

            loop {
                tokio::select! {
                    () = &mut timer => break,

                    command = command_rx.recv() => match command {
                        Some(ConnectionCommand::Send(message)) => {
                            queue.push_back(message);
                            queued.store(queue.len(), Ordering::SeqCst);
                            debug!(depth = queue.len(), "message queued while disconnected");
                        }
                        Some(ConnectionCommand::Stop) | None => {
                            Self::finish(&state, &queue);
                            return;
                        }
                    }
                }
            }

            let delay_ms = config.reconnect_delay.as_millis() as u64;
            debug!(delay_ms, "reconnecting");
        }
    }

    /// Inner loop while the link is open.
    ///
    /// Returns `true` if the loop should stop permanently.
    async fn run_open(
        config: &ConnectionConfig,
        state: &Arc<Mutex<ConnectionState>>,
        queue: &mut VecDeque<OutboundMessage>,
        queued: &AtomicUsize,
        sink: &mut dyn FrameSink,
        source: &mut dyn FrameSource,
        command_rx: &mut mpsc::UnboundedReceiver<ConnectionCommand>,
    ) -> bool {
        loop {
            tokio::select! {
                event = source.next_event() => match event {
                    TransportEvent::Frame(text) => {
                        config.router.dispatch(&text);
                    }
                    TransportEvent::Error(message) => {
                        warn!(%message, "transport error");
                        Self::emit(&config.lifecycle, &SessionEvent::Error(message));
                    }
                    TransportEvent::Closed { clean } => {
                        info!(clean, "session closed");
                        Self::set_state(state, ConnectionState::Closed);
                        Self::emit(&config.lifecycle, &SessionEvent::Closed { clean });
                        return false;
                    }
                },

                command = command_rx.recv() => match command {
                    Some(ConnectionCommand::Send(message)) => {
                        Self::send_now(config, queue, queued, sink, message).await;
                    }
                    Some(ConnectionCommand::Stop) | None => {
                        return true;
                    }
                }
            }
        }
    }

    /// Replays the disconnected-send queue in FIFO order.
    ///
    /// An entry leaves the queue only after successful hand-off; on a send
    /// failure the remainder stays queued for the next reconnect.
    async fn drain_queue(
        config: &ConnectionConfig,
        queue: &mut VecDeque<OutboundMessage>,
        queued: &AtomicUsize,
        sink: &mut dyn FrameSink,
    ) {
        if !queue.is_empty() {
            debug!(depth = queue.len(), "replaying queued messages");
        }

        loop {
            let frame = match queue.front() {
                None => break,
                Some(message) => match message.to_frame(&config.socket_id) {
                    Ok(frame) => frame,
                    Err(error) => {
                        warn!(%error, command = message.command(), "dropping unserializable message");
                        queue.pop_front();
                        queued.store(queue.len(), Ordering::SeqCst);
                        continue;
                    }
                },
            };

            if let Err(error) = sink.send(&frame).await {
                warn!(%error, "queue replay interrupted, keeping remainder");
                break;
            }

            queue.pop_front();
            queued.store(queue.len(), Ordering::SeqCst);
        }
    }

    /// Transmits one message over the live link, re-queueing on failure.
    async fn send_now(
        config: &ConnectionConfig,
        queue: &mut VecDeque<OutboundMessage>,
        queued: &AtomicUsize,
        sink: &mut dyn FrameSink,
        message: OutboundMessage,
    ) {
        let frame = match message.to_frame(&config.socket_id) {
            Ok(frame) => frame,
            Err(error) => {
                warn!(%error, command = message.command(), "dropping unserializable message");
                return;
            }
        };

        if let Err(error) = sink.send(&frame).await {
            warn!(%error, command = message.command(), "send failed, message queued");
            queue.push_back(message);
            queued.store(queue.len(), Ordering::SeqCst);
        }
    }

    /// Enters the terminal state.
    fn finish(state: &Arc<Mutex<ConnectionState>>, queue: &VecDeque<OutboundMessage>) {
        if !queue.is_empty() {
            debug!(dropped = queue.len(), "discarding queued messages on stop");
        }
        Self::set_state(state, ConnectionState::Stopped);
        debug!("connection stopped");
    }

    /// Updates the observable state.
    fn set_state(state: &Arc<Mutex<ConnectionState>>, next: ConnectionState) {
        *state.lock() = next;
    }

    /// Invokes the lifecycle callback if one is set.
    fn emit(lifecycle: &Mutex<Option<LifecycleHandler>>, event: &SessionEvent) {
        let handler = lifecycle.lock();
        if let Some(handler) = handler.as_ref() {
            handler(event);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::Value;

    use crate::session::transport::testing::{MockTransport, Script};

    /// Short delay for test reconnects.
    const TEST_DELAY: Duration = Duration::from_millis(20);

    /// Opt-in log output for debugging: `RUST_LOG=chatspace=trace`.
    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn config(
        transport: Arc<MockTransport>,
        router: Arc<CommandRouter>,
        lifecycle: Arc<Mutex<Option<LifecycleHandler>>>,
    ) -> ConnectionConfig {
        ConnectionConfig {
            url: Url::parse("ws://localhost:8000/ws").expect("url"),
            socket_id: SocketId::generate(),
            transport,
            router,
            reconnect_delay: TEST_DELAY,
            lifecycle,
        }
    }

    fn chat_input(content: &str) -> OutboundMessage {
        OutboundMessage::from_command(crate::protocol::Command::ChatInput {
            content: content.into(),
        })
        .expect("build message")
    }

    fn recording_lifecycle() -> (Arc<Mutex<Option<LifecycleHandler>>>, Arc<Mutex<Vec<SessionEvent>>>) {
        let events: Arc<Mutex<Vec<SessionEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let slot: Arc<Mutex<Option<LifecycleHandler>>> = Arc::new(Mutex::new(Some(Box::new(
            move |event: &SessionEvent| sink.lock().push(event.clone()),
        ))));
        (slot, events)
    }

    async fn settle() {
        sleep(Duration::from_millis(60)).await;
    }

    #[tokio::test]
    async fn test_send_while_closed_replays_first_on_reconnect() {
        // Scenario: chat_input sent while the transport is closed is queued,
        // and is the first frame sent, verbatim, once the transport opens.
        init_tracing();
        let (open, _events) = MockTransport::open_script();
        let transport = Arc::new(MockTransport::new(vec![Script::Fail, open]));
        let router = Arc::new(CommandRouter::new());
        let (lifecycle, _) = recording_lifecycle();

        let connection = Connection::spawn(config(
            Arc::clone(&transport),
            router,
            lifecycle,
        ));

        // Let the first dial fail, then send while closed.
        sleep(Duration::from_millis(5)).await;
        connection.send(chat_input("hi")).expect("send");
        settle().await;

        let sent = transport.sent.lock();
        assert!(!sent.is_empty(), "queued message was never replayed");

        let frame: Value = serde_json::from_str(&sent[0]).expect("frame is json");
        assert_eq!(frame["cmd"], "chat_input");
        assert_eq!(frame["content"], "hi");
        assert_eq!(connection.queued_count(), 0);
    }

    #[tokio::test]
    async fn test_disconnected_sends_replay_in_issue_order() {
        let (open, _events) = MockTransport::open_script();
        let transport = Arc::new(MockTransport::new(vec![Script::Fail, open]));
        let router = Arc::new(CommandRouter::new());
        let (lifecycle, _) = recording_lifecycle();

        let connection = Connection::spawn(config(
            Arc::clone(&transport),
            router,
            lifecycle,
        ));

        sleep(Duration::from_millis(5)).await;
        for i in 0..5 {
            connection.send(chat_input(&format!("m{i}"))).expect("send");
        }
        settle().await;

        let sent = transport.sent.lock();
        let contents: Vec<String> = sent
            .iter()
            .map(|frame| {
                let value: Value = serde_json::from_str(frame).expect("json");
                value["content"].as_str().expect("content").to_string()
            })
            .collect();

        assert_eq!(contents, vec!["m0", "m1", "m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn test_multiple_close_events_schedule_one_reconnect() {
        // Scenario: two unclean close events in quick succession must produce
        // exactly one reconnect attempt.
        let (first, first_events) = MockTransport::open_script();
        let (second, _second_events) = MockTransport::open_script();
        let transport = Arc::new(MockTransport::new(vec![first, second]));
        let router = Arc::new(CommandRouter::new());
        let (lifecycle, _) = recording_lifecycle();

        let _connection = Connection::spawn(config(
            Arc::clone(&transport),
            router,
            lifecycle,
        ));

        sleep(Duration::from_millis(5)).await;
        assert_eq!(transport.connect_count(), 1);

        first_events
            .send(TransportEvent::Closed { clean: false })
            .expect("first close");
        let _ = first_events.send(TransportEvent::Closed { clean: false });

        settle().await;
        assert_eq!(transport.connect_count(), 2);

        // No third dial: the second link is still open.
        settle().await;
        assert_eq!(transport.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_lifecycle_event_sequence() {
        let (open, events_tx) = MockTransport::open_script();
        let transport = Arc::new(MockTransport::new(vec![open]));
        let router = Arc::new(CommandRouter::new());
        let (lifecycle, events) = recording_lifecycle();

        let connection = Connection::spawn(ConnectionConfig {
            reconnect_delay: Duration::from_secs(10),
            ..config(Arc::clone(&transport), router, lifecycle)
        });

        sleep(Duration::from_millis(5)).await;
        assert_eq!(connection.state(), ConnectionState::Open);

        events_tx
            .send(TransportEvent::Closed { clean: true })
            .expect("close");
        sleep(Duration::from_millis(10)).await;

        assert_eq!(
            *events.lock(),
            vec![SessionEvent::Opened, SessionEvent::Closed { clean: true }]
        );
        assert_eq!(connection.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_transport_error_does_not_trigger_reconnect() {
        let (open, events_tx) = MockTransport::open_script();
        let transport = Arc::new(MockTransport::new(vec![open]));
        let router = Arc::new(CommandRouter::new());
        let (lifecycle, events) = recording_lifecycle();

        let connection = Connection::spawn(config(
            Arc::clone(&transport),
            router,
            lifecycle,
        ));

        sleep(Duration::from_millis(5)).await;
        events_tx
            .send(TransportEvent::Error("tls hiccup".into()))
            .expect("error event");
        settle().await;

        // Still on the original link, still open.
        assert_eq!(transport.connect_count(), 1);
        assert_eq!(connection.state(), ConnectionState::Open);
        assert!(
            events
                .lock()
                .iter()
                .any(|e| matches!(e, SessionEvent::Error(_)))
        );
        assert!(
            !events
                .lock()
                .iter()
                .any(|e| matches!(e, SessionEvent::Closed { .. }))
        );
    }

    #[tokio::test]
    async fn test_inbound_frames_dispatch_through_router() {
        let (open, events_tx) = MockTransport::open_script();
        let transport = Arc::new(MockTransport::new(vec![open]));
        let router = Arc::new(CommandRouter::new());
        let (lifecycle, _) = recording_lifecycle();

        let received: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        {
            let received = Arc::clone(&received);
            router.register(
                "append_chat",
                Arc::new(move |msg| {
                    received.lock().push(msg.get_str("content"));
                    Ok(())
                }),
            );
        }

        let _connection = Connection::spawn(config(
            Arc::clone(&transport),
            Arc::clone(&router),
            lifecycle,
        ));

        sleep(Duration::from_millis(5)).await;
        events_tx
            .send(TransportEvent::Frame(
                r#"{"cmd":"append_chat","content":"hello"}"#.into(),
            ))
            .expect("frame");
        settle().await;

        assert_eq!(*received.lock(), vec!["hello"]);
    }

    #[tokio::test]
    async fn test_stop_cancels_pending_reconnect() {
        let (open, events_tx) = MockTransport::open_script();
        let (second, _second_events) = MockTransport::open_script();
        let transport = Arc::new(MockTransport::new(vec![open, second]));
        let router = Arc::new(CommandRouter::new());
        let (lifecycle, _) = recording_lifecycle();

        let connection = Connection::spawn(config(
            Arc::clone(&transport),
            router,
            lifecycle,
        ));

        sleep(Duration::from_millis(5)).await;
        events_tx
            .send(TransportEvent::Closed { clean: false })
            .expect("close");
        sleep(Duration::from_millis(5)).await;

        // Stop while the reconnect timer is pending.
        connection.stop();
        settle().await;

        assert_eq!(connection.state(), ConnectionState::Stopped);
        assert_eq!(transport.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_send_after_stop_errors() {
        let (open, _events_tx) = MockTransport::open_script();
        let transport = Arc::new(MockTransport::new(vec![open]));
        let router = Arc::new(CommandRouter::new());
        let (lifecycle, _) = recording_lifecycle();

        let connection = Connection::spawn(config(transport, router, lifecycle));

        sleep(Duration::from_millis(5)).await;
        connection.stop();
        settle().await;

        let err = connection.send(chat_input("late")).unwrap_err();
        assert!(matches!(err, Error::SessionStopped));
    }

    #[tokio::test]
    async fn test_open_sends_go_straight_to_transport() {
        let (open, _events_tx) = MockTransport::open_script();
        let transport = Arc::new(MockTransport::new(vec![open]));
        let router = Arc::new(CommandRouter::new());
        let (lifecycle, _) = recording_lifecycle();

        let connection = Connection::spawn(config(
            Arc::clone(&transport),
            router,
            lifecycle,
        ));

        sleep(Duration::from_millis(5)).await;
        connection.send(chat_input("direct")).expect("send");
        settle().await;

        assert_eq!(transport.sent.lock().len(), 1);
        assert_eq!(connection.queued_count(), 0);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    use proptest::prelude::*;
    use serde_json::Value;

    use crate::session::transport::testing::{MockTransport, Script};

    /// Runs one disconnected-send scenario and returns the replayed contents.
    fn replay_contents(contents: Vec<String>) -> Vec<String> {
        let rt = tokio::runtime::Runtime::new().expect("runtime");

        rt.block_on(async move {
            let (open, _events) = MockTransport::open_script();
            let transport = Arc::new(MockTransport::new(vec![Script::Fail, open]));
            let lifecycle = Arc::new(Mutex::new(None));

            let connection = Connection::spawn(ConnectionConfig {
                url: Url::parse("ws://localhost:8000/ws").expect("url"),
                socket_id: SocketId::generate(),
                transport: transport.clone(),
                router: Arc::new(CommandRouter::new()),
                reconnect_delay: Duration::from_millis(15),
                lifecycle,
            });

            sleep(Duration::from_millis(5)).await;
            for content in &contents {
                connection
                    .send(
                        OutboundMessage::from_command(crate::protocol::Command::ChatInput {
                            content: content.clone(),
                        })
                        .expect("build message"),
                    )
                    .expect("send");
            }
            sleep(Duration::from_millis(60)).await;

            let sent = transport.sent.lock();
            sent.iter()
                .map(|frame| {
                    let value: Value = serde_json::from_str(frame).expect("json");
                    value["content"].as_str().expect("content").to_string()
                })
                .collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 16,
            ..ProptestConfig::default()
        })]

        /// For all sequences of sends issued while disconnected, the messages
        /// reach the transport, once reconnected, in exactly issue order.
        #[test]
        fn disconnected_sends_replay_in_issue_order(
            contents in proptest::collection::vec("[a-z]{1,8}", 1..10)
        ) {
            let replayed = replay_contents(contents.clone());
            prop_assert_eq!(replayed, contents);
        }
    }
}
