//! Session controller.

use std::sync::Arc;

use parking_lot::Mutex;
use studio_protocol::{classify, InboundMessage, OutboundMessage};
use studio_relay::{ReadyState, RelayClient, RelaySubscription};
use studio_store::{Bucket, Prompt, PromptCache, Store};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{SessionError, SessionResult};

/// Whether a generation is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Busy,
}

struct Inner {
    relay: RelayClient,
    store: Store,
    cache: Option<PromptCache>,
    phase: watch::Sender<SessionPhase>,
    /// Serializes `start` calls.
    start_lock: Mutex<()>,
}

/// Starts generations and ingests the frames they produce.
///
/// Cloning is cheap; clones share the phase and the store.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    pub fn new(relay: RelayClient, store: Store) -> Self {
        Self::build(relay, store, None)
    }

    /// Also persist every started prompt to `cache`.
    pub fn with_prompt_cache(relay: RelayClient, store: Store, cache: PromptCache) -> Self {
        Self::build(relay, store, Some(cache))
    }

    fn build(relay: RelayClient, store: Store, cache: Option<PromptCache>) -> Self {
        let (phase, _) = watch::channel(SessionPhase::Idle);
        Self {
            inner: Arc::new(Inner {
                relay,
                store,
                cache,
                phase,
                start_lock: Mutex::new(()),
            }),
        }
    }

    pub fn relay(&self) -> &RelayClient {
        &self.inner.relay
    }

    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    pub fn phase(&self) -> SessionPhase {
        *self.inner.phase.borrow()
    }

    pub fn watch_phase(&self) -> watch::Receiver<SessionPhase> {
        self.inner.phase.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.phase() == SessionPhase::Busy
    }

    fn set_phase(&self, phase: SessionPhase) {
        let previous = self.inner.phase.send_replace(phase);
        if previous != phase {
            debug!(from = ?previous, to = ?phase, "Session phase changed");
        }
    }

    /// Start a new generation for `prompt`.
    ///
    /// Fails without touching any bucket when a session is running or the
    /// connection is not open. Otherwise the output buckets are cleared and
    /// the prompt set in one transaction before the start message goes out.
    pub fn start(&self, prompt: impl Into<String>) -> SessionResult<()> {
        let prompt = prompt.into();
        let _guard = self.inner.start_lock.lock();

        if self.is_busy() {
            return Err(SessionError::Busy);
        }

        let state = self.inner.relay.ready_state();
        if state != ReadyState::Open {
            return Err(SessionError::ConnectionNotReady { state });
        }

        self.inner.store.transaction(|txn| {
            txn.reset(&Bucket::SESSION_OUTPUT);
            txn.set::<Prompt>(prompt.clone());
        });

        if let Some(cache) = &self.inner.cache {
            if let Err(e) = cache.save(&prompt) {
                warn!(path = %cache.path().display(), error = %e, "Failed to cache prompt");
            }
        }

        self.set_phase(SessionPhase::Busy);
        if let Err(e) = self
            .inner
            .relay
            .send(&OutboundMessage::start_design(prompt.as_str()))
        {
            warn!(error = %e, "Failed to send start message");
            self.set_phase(SessionPhase::Idle);
            return Err(e.into());
        }

        info!(prompt_len = prompt.len(), "Design session started");
        Ok(())
    }

    /// Classify one frame and fold it into the store.
    ///
    /// Agent step frames recompute the busy flag from their `is_final`
    /// marker. Malformed frames are dropped.
    pub fn ingest(&self, message: InboundMessage) {
        let event = message.event.clone();
        let classification = match classify(message) {
            Ok(classification) => classification,
            Err(e) => {
                warn!(%event, error = %e, "Dropping malformed frame");
                return;
            }
        };

        let finality = classification.finality();
        self.inner.store.apply(classification);

        if let Some(is_final) = finality {
            if is_final {
                info!(%event, "Design session finished");
            }
            self.set_phase(if is_final {
                SessionPhase::Idle
            } else {
                SessionPhase::Busy
            });
        }
    }

    /// Ingest frames from `subscription` one at a time until it ends.
    ///
    /// A relay that gives up reconnecting leaves the session idle. Transient
    /// disconnects keep a running session busy.
    pub async fn run(&self, mut subscription: RelaySubscription) {
        let mut ready = self.inner.relay.watch_ready_state();
        let mut watching = true;

        if *ready.borrow_and_update() == ReadyState::Failed {
            self.on_relay_failed();
        }

        loop {
            tokio::select! {
                frame = subscription.recv() => match frame {
                    Some(message) => self.ingest(message),
                    None => break,
                },
                changed = ready.changed(), if watching => {
                    if changed.is_err() {
                        watching = false;
                        continue;
                    }
                    let state = *ready.borrow_and_update();
                    if state == ReadyState::Failed {
                        self.on_relay_failed();
                    }
                }
            }
        }

        debug!("Ingestion loop finished");
    }

    /// Subscribe to the relay and run the ingestion loop on a new task.
    pub fn spawn_ingestion(&self) -> JoinHandle<()> {
        let subscription = self.inner.relay.subscribe();
        let controller = self.clone();
        tokio::spawn(async move { controller.run(subscription).await })
    }

    /// Resolve once the session is idle.
    pub async fn wait_idle(&self) {
        let mut phase = self.watch_phase();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = phase.wait_for(|p| *p == SessionPhase::Idle).await;
    }

    fn on_relay_failed(&self) {
        if self.is_busy() {
            warn!("Connection failed permanently; abandoning session");
        }
        self.set_phase(SessionPhase::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use studio_store::{Logs, State};

    fn controller() -> SessionController {
        SessionController::new(RelayClient::with_defaults(), Store::with_prompt("old prompt"))
    }

    fn frame(event: &str, data: serde_json::Value) -> InboundMessage {
        InboundMessage::new(event, data)
    }

    #[test]
    fn starts_idle() {
        let controller = controller();
        assert_eq!(controller.phase(), SessionPhase::Idle);
        assert!(!controller.is_busy());
    }

    #[test]
    fn start_refuses_when_not_connected() {
        let controller = controller();
        controller.ingest(frame(
            "text_response",
            json!({"author": "a", "text": "keep", "is_final": true}),
        ));

        let result = controller.start("new prompt");
        assert!(matches!(
            result,
            Err(SessionError::ConnectionNotReady {
                state: ReadyState::Closed
            })
        ));

        let store = controller.store();
        assert_eq!(store.prompt().as_str(), "old prompt");
        assert_eq!(store.get::<Logs>().len(), 1);
        assert_eq!(controller.phase(), SessionPhase::Idle);
    }

    #[test]
    fn start_refuses_while_busy() {
        let controller = controller();
        controller.ingest(frame("function_call", json!({"function_name": "search"})));
        assert!(controller.is_busy());

        assert!(matches!(controller.start("again"), Err(SessionError::Busy)));
        assert_eq!(controller.store().prompt().as_str(), "old prompt");
    }

    #[test]
    fn agent_steps_drive_the_busy_flag() {
        let controller = controller();

        controller.ingest(frame("function_call", json!({"function_name": "f"})));
        assert_eq!(controller.phase(), SessionPhase::Busy);

        controller.ingest(frame("state", json!({"brief": "b"})));
        controller.ingest(frame("artifact", json!({"url": "u", "is_final": true})));
        controller.ingest(frame("handoff", json!({"is_final": true})));
        assert_eq!(controller.phase(), SessionPhase::Busy);

        controller.ingest(frame(
            "text_response",
            json!({"author": "a", "text": "t", "is_final": true}),
        ));
        assert_eq!(controller.phase(), SessionPhase::Idle);

        controller.ingest(frame(
            "function_response",
            json!({"function_name": "f", "is_final": false}),
        ));
        assert_eq!(controller.phase(), SessionPhase::Busy);
    }

    #[test]
    fn malformed_frames_are_dropped() {
        let controller = controller();
        controller.ingest(frame("state", json!(["not", "an", "object"])));
        controller.ingest(frame("artifact", json!(42)));

        assert!(controller.store().get::<State>().is_empty());
        assert!(controller.store().artifacts().is_empty());
        assert_eq!(controller.phase(), SessionPhase::Idle);
    }

    #[tokio::test]
    async fn wait_idle_resolves_on_final_frame() {
        let controller = controller();
        controller.ingest(frame("function_call", json!({"function_name": "f"})));

        let waiter = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.wait_idle().await })
        };
        controller.ingest(frame(
            "text_response",
            json!({"author": "a", "text": "t", "is_final": true}),
        ));

        tokio::time::timeout(std::time::Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
