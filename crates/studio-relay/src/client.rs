//! Shared WebSocket client.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use studio_protocol::{InboundMessage, OutboundMessage};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};

use crate::hub::{SubscriberHub, SubscriberId};
use crate::{RelayError, RelayResult};

/// Relay client configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Backend endpoint (e.g., ws://localhost:8080/api/ws).
    pub url: String,
    /// Delay before the first reconnect attempt, in milliseconds.
    pub reconnect_base_delay_ms: u64,
    /// Maximum reconnect delay, in milliseconds.
    pub reconnect_max_delay_ms: u64,
    /// Consecutive failed reconnects before giving up; `None` never gives up.
    pub max_reconnect_attempts: Option<u32>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8080/api/ws".to_string(),
            reconnect_base_delay_ms: 500,
            reconnect_max_delay_ms: 10_000,
            max_reconnect_attempts: None,
        }
    }
}

impl RelayConfig {
    /// Exponential backoff for the given 1-based attempt, capped at the max.
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        let delay = self
            .reconnect_base_delay_ms
            .saturating_mul(factor)
            .min(self.reconnect_max_delay_ms);
        Duration::from_millis(delay)
    }
}

/// Connection readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Connecting,
    Open,
    Closed,
    /// Reconnect attempts exhausted; only reachable with a configured limit.
    Failed,
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Writer side of the current socket. `generation` changes on every
/// teardown so a connection task that outlives its teardown cannot publish
/// state or a sender.
#[derive(Default)]
struct Link {
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<Message>>,
}

struct Shared {
    config: RelayConfig,
    state: watch::Sender<ReadyState>,
    link: Mutex<Link>,
    subscribers: SubscriberHub,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to the shared backend connection.
///
/// Cloning is cheap and every clone talks to the same socket. The socket is
/// opened when the first [`RelaySubscription`] is created and closed when the
/// last one is dropped.
#[derive(Clone)]
pub struct RelayClient {
    shared: Arc<Shared>,
}

impl RelayClient {
    /// Create a new relay client with the given configuration.
    pub fn new(config: RelayConfig) -> Self {
        let (state, _) = watch::channel(ReadyState::Closed);
        Self {
            shared: Arc::new(Shared {
                config,
                state,
                link: Mutex::new(Link::default()),
                subscribers: SubscriberHub::default(),
                task: Mutex::new(None),
            }),
        }
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(RelayConfig::default())
    }

    pub fn config(&self) -> &RelayConfig {
        &self.shared.config
    }

    /// Current readiness.
    pub fn ready_state(&self) -> ReadyState {
        *self.shared.state.borrow()
    }

    /// Watch readiness transitions.
    pub fn watch_ready_state(&self) -> watch::Receiver<ReadyState> {
        self.shared.state.subscribe()
    }

    pub fn is_open(&self) -> bool {
        self.ready_state() == ReadyState::Open
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.len()
    }

    /// Register for inbound frames, opening the connection if no task is
    /// running. Must be called from within a Tokio runtime.
    pub fn subscribe(&self) -> RelaySubscription {
        let mut task = self.shared.task.lock();
        let (id, receiver) = self.shared.subscribers.register();

        let generation = self.shared.link.lock().generation;
        let running = task.as_ref().is_some_and(|handle| !handle.is_finished());
        if !running {
            debug!(url = %self.shared.config.url, generation, "Starting connection task");
            let shared = self.shared.clone();
            *task = Some(tokio::spawn(run_connection(shared, generation)));
        }

        RelaySubscription {
            id,
            generation,
            receiver,
            shared: self.shared.clone(),
        }
    }

    /// Send a message. Fails immediately unless the connection is open.
    pub fn send(&self, message: &OutboundMessage) -> RelayResult<()> {
        if !self.is_open() {
            return Err(RelayError::NotConnected);
        }

        let json = serde_json::to_string(message)?;
        let link = self.shared.link.lock();
        let sender = link.outbound.as_ref().ok_or(RelayError::NotConnected)?;
        sender
            .send(Message::Text(json.into()))
            .map_err(|e| RelayError::Send(e.to_string()))
    }

    /// Tear the connection down and close every subscription. Frames still
    /// queued in a subscription are discarded.
    pub fn shutdown(&self) {
        let mut task = self.shared.task.lock();
        self.shared.subscribers.clear();
        self.shared.stop(&mut task, "shutdown requested");
    }
}

/// A live registration on the shared connection. Dropping it unsubscribes.
pub struct RelaySubscription {
    id: SubscriberId,
    /// Connection generation this subscription belongs to.
    generation: u64,
    receiver: mpsc::UnboundedReceiver<InboundMessage>,
    shared: Arc<Shared>,
}

impl RelaySubscription {
    /// Next frame in delivery order; `None` once the relay is shut down.
    pub async fn recv(&mut self) -> Option<InboundMessage> {
        if self.is_torn_down() {
            return None;
        }
        let message = self.receiver.recv().await?;
        self.accept(message)
    }

    /// Next frame if one is already queued.
    pub fn try_recv(&mut self) -> Option<InboundMessage> {
        if self.is_torn_down() {
            return None;
        }
        let message = self.receiver.try_recv().ok()?;
        self.accept(message)
    }

    fn is_torn_down(&self) -> bool {
        self.shared.link.lock().generation != self.generation
    }

    /// Hand out a dequeued frame unless the connection was torn down while
    /// it sat in the queue. Anything left behind is dropped with it.
    fn accept(&mut self, message: InboundMessage) -> Option<InboundMessage> {
        if self.is_torn_down() {
            self.receiver.close();
            while self.receiver.try_recv().is_ok() {}
            trace!(event = %message.event, "Discarding frame queued before teardown");
            return None;
        }
        Some(message)
    }
}

impl Drop for RelaySubscription {
    fn drop(&mut self) {
        if self.shared.subscribers.unregister(self.id) == Some(0) {
            self.shared.stop_if_unused();
        }
    }
}

impl Shared {
    fn set_state(&self, state: ReadyState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "Ready state changed");
        }
    }

    /// Publish a state from the connection task of `generation`.
    fn publish(&self, generation: u64, state: ReadyState) -> bool {
        let link = self.link.lock();
        if link.generation != generation {
            return false;
        }
        self.set_state(state);
        true
    }

    fn open_link(&self, generation: u64, sender: mpsc::UnboundedSender<Message>) -> bool {
        let mut link = self.link.lock();
        if link.generation != generation {
            return false;
        }
        link.outbound = Some(sender);
        self.set_state(ReadyState::Open);
        true
    }

    fn close_link(&self, generation: u64) {
        let mut link = self.link.lock();
        if link.generation == generation {
            link.outbound = None;
            self.set_state(ReadyState::Closed);
        }
    }

    /// Tear down unless a subscriber registered in the meantime.
    fn stop_if_unused(&self) {
        let mut task = self.task.lock();
        if self.subscribers.len() == 0 {
            self.stop(&mut task, "last subscriber dropped");
        }
    }

    fn stop(&self, task: &mut Option<JoinHandle<()>>, reason: &str) {
        {
            let mut link = self.link.lock();
            link.generation += 1;
            link.outbound = None;
            self.set_state(ReadyState::Closed);
        }
        if let Some(handle) = task.take() {
            handle.abort();
            info!(reason, "Connection torn down");
        }
    }

    /// Broadcast one frame read by the connection task of `generation`.
    /// The link lock is held across the broadcast, so a teardown lands
    /// either wholly before or wholly after it.
    fn dispatch(&self, generation: u64, text: &str) {
        match InboundMessage::from_json(text) {
            Ok(message) => {
                let link = self.link.lock();
                if link.generation != generation {
                    trace!(event = %message.event, "Skipping frame from a torn-down socket");
                    return;
                }
                trace!(event = %message.event, "Inbound frame");
                self.subscribers.broadcast(&message);
            }
            Err(e) => {
                warn!(error = %e, frame_len = text.len(), "Dropping malformed frame");
            }
        }
    }

    /// Pump one open socket until it closes.
    async fn pump(&self, generation: u64, ws: WsStream) {
        let (mut write, mut read) = ws.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

        let writer = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if let Err(e) = write.send(message).await {
                    debug!(error = %e, "Write failed");
                    break;
                }
            }
        });

        if !self.open_link(generation, tx.clone()) {
            writer.abort();
            return;
        }
        info!(url = %self.config.url, "Connected to backend");

        while let Some(frame) = read.next().await {
            match frame {
                Ok(Message::Text(text)) => self.dispatch(generation, text.as_str()),
                Ok(Message::Ping(data)) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Ok(Message::Close(frame)) => {
                    info!(?frame, "Backend closed the connection");
                    break;
                }
                Ok(Message::Binary(data)) => {
                    debug!(len = data.len(), "Ignoring binary frame");
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "WebSocket error");
                    break;
                }
            }
        }

        self.close_link(generation);
        writer.abort();
    }
}

/// Connect, pump, and reconnect until aborted or out of attempts.
async fn run_connection(shared: Arc<Shared>, generation: u64) {
    let mut attempts: u32 = 0;

    loop {
        if !shared.publish(generation, ReadyState::Connecting) {
            return;
        }
        info!(url = %shared.config.url, attempt = attempts, "Connecting to backend");

        match connect_async(shared.config.url.as_str()).await {
            Ok((ws, _)) => {
                attempts = 0;
                shared.pump(generation, ws).await;
            }
            Err(e) => {
                warn!(error = %e, "Connection attempt failed");
                shared.publish(generation, ReadyState::Closed);
            }
        }

        attempts = attempts.saturating_add(1);
        if let Some(max) = shared.config.max_reconnect_attempts {
            if attempts > max {
                error!(attempts, "Max reconnect attempts reached");
                shared.publish(generation, ReadyState::Failed);
                return;
            }
        }

        let delay = shared.config.reconnect_delay(attempts);
        info!(
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            "Scheduling reconnect"
        );
        tokio::time::sleep(delay).await;
    }
}
