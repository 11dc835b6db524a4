//! Relay tests against a scripted local WebSocket server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use studio_protocol::OutboundMessage;
use studio_relay::{ReadyState, RelayClient, RelayConfig, RelayError};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};

const TIMEOUT: Duration = Duration::from_secs(5);

enum Command {
    Text(String),
    Close,
}

/// Serves one connection at a time. Commands go to whichever connection is
/// current; text frames from the client land in `received`.
struct TestServer {
    url: String,
    accepted: Arc<AtomicUsize>,
    disconnected: Arc<AtomicUsize>,
    commands: mpsc::UnboundedSender<Command>,
    received: mpsc::UnboundedReceiver<String>,
}

impl TestServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/api/ws", listener.local_addr().unwrap());

        let accepted = Arc::new(AtomicUsize::new(0));
        let disconnected = Arc::new(AtomicUsize::new(0));
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (received_tx, received) = mpsc::unbounded_channel();

        tokio::spawn(serve(
            listener,
            accepted.clone(),
            disconnected.clone(),
            Arc::new(Mutex::new(command_rx)),
            received_tx,
        ));

        Self {
            url,
            accepted,
            disconnected,
            commands,
            received,
        }
    }

    fn push(&self, frame: serde_json::Value) {
        self.push_raw(frame.to_string());
    }

    fn push_raw(&self, text: impl Into<String>) {
        self.commands.send(Command::Text(text.into())).unwrap();
    }

    fn close_current(&self) {
        self.commands.send(Command::Close).unwrap();
    }

    fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    fn disconnected(&self) -> usize {
        self.disconnected.load(Ordering::SeqCst)
    }
}

async fn serve(
    listener: TcpListener,
    accepted: Arc<AtomicUsize>,
    disconnected: Arc<AtomicUsize>,
    commands: Arc<Mutex<mpsc::UnboundedReceiver<Command>>>,
    received: mpsc::UnboundedSender<String>,
) {
    while let Ok((stream, _)) = listener.accept().await {
        accepted.fetch_add(1, Ordering::SeqCst);
        let Ok(ws) = accept_async(stream).await else {
            disconnected.fetch_add(1, Ordering::SeqCst);
            continue;
        };

        let mut commands = commands.lock().await;
        let (mut write, mut read) = ws.split();
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Text(text)) => {
                        if write.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Command::Close) | None => {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                },
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        let _ = received.send(text.as_str().to_string());
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
            }
        }
        disconnected.fetch_add(1, Ordering::SeqCst);
    }
}

fn fast_config(url: &str) -> RelayConfig {
    RelayConfig {
        url: url.to_string(),
        reconnect_base_delay_ms: 20,
        reconnect_max_delay_ms: 100,
        max_reconnect_attempts: None,
    }
}

async fn wait_for_state(client: &RelayClient, want: ReadyState) {
    let mut rx = client.watch_ready_state();
    tokio::time::timeout(TIMEOUT, rx.wait_for(|state| *state == want))
        .await
        .expect("timed out waiting for ready state")
        .expect("state channel closed");
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("timed out waiting for condition");
}

#[tokio::test]
async fn one_socket_is_shared_by_every_subscriber() {
    let server = TestServer::start().await;
    let client = RelayClient::new(fast_config(&server.url));

    let mut first = client.subscribe();
    let mut second = client.clone().subscribe();
    wait_for_state(&client, ReadyState::Open).await;
    assert_eq!(server.accepted(), 1);
    assert_eq!(client.subscriber_count(), 2);

    server.push(json!({"event": "text_response", "data": {"author": "a", "text": "one"}}));
    server.push_raw("this is not json");
    server.push(json!({"event": "state", "data": {"brief": "# Brief"}}));

    for subscription in [&mut first, &mut second] {
        let a = tokio::time::timeout(TIMEOUT, subscription.recv())
            .await
            .unwrap()
            .unwrap();
        let b = tokio::time::timeout(TIMEOUT, subscription.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(a.event, "text_response");
        assert_eq!(a.data["text"], "one");
        assert_eq!(b.event, "state");
        assert!(subscription.try_recv().is_none());
    }

    assert_eq!(server.accepted(), 1);
}

#[tokio::test]
async fn send_reaches_backend_when_open() {
    let mut server = TestServer::start().await;
    let client = RelayClient::new(fast_config(&server.url));

    let _subscription = client.subscribe();
    wait_for_state(&client, ReadyState::Open).await;

    client
        .send(&OutboundMessage::start_design("red dress"))
        .unwrap();

    let frame = tokio::time::timeout(TIMEOUT, server.received.recv())
        .await
        .unwrap()
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(
        value,
        json!({"event": "start_design", "data": {"prompt": "red dress"}})
    );
}

#[tokio::test]
async fn last_unsubscribe_closes_the_socket() {
    let server = TestServer::start().await;
    let client = RelayClient::new(fast_config(&server.url));

    let first = client.subscribe();
    let second = client.subscribe();
    wait_for_state(&client, ReadyState::Open).await;

    drop(first);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(client.is_open());
    assert_eq!(server.disconnected(), 0);

    drop(second);
    assert_eq!(client.ready_state(), ReadyState::Closed);
    assert!(matches!(
        client.send(&OutboundMessage::start_design("late")),
        Err(RelayError::NotConnected)
    ));
    wait_until(|| server.disconnected() == 1).await;

    // A new subscriber opens a fresh socket.
    let _again = client.subscribe();
    wait_for_state(&client, ReadyState::Open).await;
    assert_eq!(server.accepted(), 2);
}

#[tokio::test]
async fn reconnects_after_server_close() {
    let server = TestServer::start().await;
    let client = RelayClient::new(fast_config(&server.url));

    let mut subscription = client.subscribe();
    wait_for_state(&client, ReadyState::Open).await;

    server.close_current();
    wait_until(|| server.accepted() == 2).await;
    wait_for_state(&client, ReadyState::Open).await;

    server.push(json!({"event": "function_call", "data": {"function_name": "search"}}));
    let frame = tokio::time::timeout(TIMEOUT, subscription.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(frame.event, "function_call");
}

#[tokio::test]
async fn gives_up_after_configured_attempts() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = RelayClient::new(RelayConfig {
        url: format!("ws://{}/api/ws", addr),
        reconnect_base_delay_ms: 10,
        reconnect_max_delay_ms: 20,
        max_reconnect_attempts: Some(2),
    });

    let _subscription = client.subscribe();
    wait_for_state(&client, ReadyState::Failed).await;
    assert!(matches!(
        client.send(&OutboundMessage::start_design("x")),
        Err(RelayError::NotConnected)
    ));
}

#[tokio::test]
async fn shutdown_ends_every_subscription() {
    let server = TestServer::start().await;
    let client = RelayClient::new(fast_config(&server.url));

    let mut subscription = client.subscribe();
    let mut witness = client.subscribe();
    wait_for_state(&client, ReadyState::Open).await;

    server.push(json!({"event": "artifact", "data": {"url": "https://cdn/x.png"}}));
    let frame = tokio::time::timeout(TIMEOUT, subscription.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(frame.event, "artifact");
    tokio::time::timeout(TIMEOUT, witness.recv())
        .await
        .unwrap()
        .unwrap();

    // Once the witness has it, the frame sits in every queue.
    server.push(json!({"event": "function_call", "data": {"function_name": "late"}}));
    let queued = tokio::time::timeout(TIMEOUT, witness.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(queued.event, "function_call");

    client.shutdown();
    assert_eq!(client.ready_state(), ReadyState::Closed);
    assert_eq!(client.subscriber_count(), 0);

    assert!(subscription.try_recv().is_none());
    let next = tokio::time::timeout(TIMEOUT, subscription.recv()).await.unwrap();
    assert!(next.is_none());
    wait_until(|| server.disconnected() == 1).await;
}

#[tokio::test]
async fn frames_queued_before_shutdown_are_discarded() {
    let server = TestServer::start().await;
    let client = RelayClient::new(fast_config(&server.url));

    let mut idle = client.subscribe();
    let mut witness = client.subscribe();
    wait_for_state(&client, ReadyState::Open).await;

    for n in 0..3 {
        let name = format!("step-{}", n);
        server.push(json!({"event": "function_call", "data": {"function_name": name}}));
    }
    for _ in 0..3 {
        tokio::time::timeout(TIMEOUT, witness.recv())
            .await
            .unwrap()
            .unwrap();
    }

    client.shutdown();

    let next = tokio::time::timeout(TIMEOUT, idle.recv()).await.unwrap();
    assert!(next.is_none());
    assert!(idle.try_recv().is_none());

    // A subscriber after teardown starts clean on a fresh socket.
    let mut fresh = client.subscribe();
    wait_for_state(&client, ReadyState::Open).await;
    assert!(fresh.try_recv().is_none());
    server.push(json!({"event": "state", "data": {"brief": "new"}}));
    let frame = tokio::time::timeout(TIMEOUT, fresh.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(frame.event, "state");
    assert!(idle.try_recv().is_none());
}
