//! Peer role: forwards tool calls through the hub and receives its
//! context broadcasts.
//!
//! A peer dials the hub, proves itself with the preshared token, registers
//! its agent name, and then treats the hub exactly like a browser: requests
//! out, correlated responses in. When the socket drops, every in-flight call
//! fails with `CONNECTION_LOST` and a full-jitter backoff loop re-dials until
//! it succeeds, the attempt budget runs out, or shutdown clears
//! `should_reconnect`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use uuid::Uuid;

use gitnexus_core::resilience::full_jitter_delay;
use gitnexus_core::{GatewayError, GatewayResult};

use super::message::{BridgeMessage, ControlMessage, RequestFrame};
use super::{ws_config, BridgeMode, BridgeShared, HANDSHAKE_TIMEOUT, MAX_RECONNECT_ATTEMPTS};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Peer-side connection state.
pub(crate) struct PeerState {
    tx: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    connected: AtomicBool,
    should_reconnect: AtomicBool,
}

impl PeerState {
    pub(crate) fn new() -> Self {
        Self {
            tx: Mutex::new(None),
            connected: AtomicBool::new(false),
            should_reconnect: AtomicBool::new(true),
        }
    }

    /// Forward a request frame to the hub.
    pub(crate) fn send(&self, frame: &RequestFrame) -> GatewayResult<()> {
        let text = BridgeMessage::Request(frame.clone()).to_text();
        let tx = self.tx.lock();
        match tx.as_ref() {
            Some(sender) => sender
                .send(Message::Text(text))
                .map_err(|_| GatewayError::BrowserDisconnected),
            None => Err(GatewayError::BrowserDisconnected),
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// User-initiated disconnect: stop the reconnect loop for good.
    pub(crate) fn stop_reconnect(&self) {
        self.should_reconnect.store(false, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        *self.tx.lock() = None;
    }

    fn should_reconnect(&self) -> bool {
        self.should_reconnect.load(Ordering::SeqCst)
    }

    fn install_tx(&self, sender: mpsc::UnboundedSender<Message>) {
        *self.tx.lock() = Some(sender);
    }

    fn clear_tx(&self) {
        *self.tx.lock() = None;
    }
}

/// Dial the hub and complete the handshake + registration sequence.
///
/// The whole join is bounded by [`HANDSHAKE_TIMEOUT`] so a port held by an
/// unrelated process cannot stall the election.
pub(crate) async fn connect(shared: &Arc<BridgeShared>) -> GatewayResult<WsStream> {
    let url = format!("ws://127.0.0.1:{}", shared.config.port);

    let (mut socket, _) = timeout(
        HANDSHAKE_TIMEOUT,
        connect_async_with_config(url.as_str(), Some(ws_config()), false),
    )
    .await
    .map_err(|_| internal("hub connect timed out"))?
    .map_err(|err| internal(&format!("hub connect failed: {err}")))?;

    let handshake_id = Uuid::new_v4().to_string();
    let handshake = BridgeMessage::Control(ControlMessage::Handshake {
        id: handshake_id.clone(),
        token: shared.config.token.clone(),
    });
    socket
        .send(Message::Text(handshake.to_text()))
        .await
        .map_err(|err| internal(&format!("handshake send failed: {err}")))?;

    // The ack must arrive within the handshake window.
    let deadline = tokio::time::Instant::now() + HANDSHAKE_TIMEOUT;
    loop {
        let frame = timeout(deadline - tokio::time::Instant::now(), socket.next())
            .await
            .map_err(|_| internal("handshake ack timed out"))?
            .ok_or_else(|| internal("hub closed during handshake"))?
            .map_err(|err| internal(&format!("handshake read failed: {err}")))?;

        match frame {
            Message::Text(text) => match BridgeMessage::parse(&text) {
                Ok(BridgeMessage::Control(ControlMessage::HandshakeAck { id }))
                    if id == handshake_id =>
                {
                    break;
                }
                Ok(BridgeMessage::Control(ControlMessage::HandshakeNack { error, .. })) => {
                    return Err(internal(&format!(
                        "handshake rejected: {}",
                        error.unwrap_or_else(|| "no reason given".to_string())
                    )));
                }
                _ => continue,
            },
            Message::Close(_) => return Err(internal("hub closed during handshake")),
            _ => continue,
        }
    }

    let register = BridgeMessage::Control(ControlMessage::RegisterPeer {
        agent_name: shared.config.agent_name.clone(),
    });
    socket
        .send(Message::Text(register.to_text()))
        .await
        .map_err(|err| internal(&format!("register send failed: {err}")))?;

    Ok(socket)
}

fn internal(message: &str) -> GatewayError {
    GatewayError::Internal {
        message: message.to_string(),
    }
}

/// Read loop plus reconnect loop; runs until shutdown or retry exhaustion.
pub(crate) async fn run(shared: Arc<BridgeShared>, mut socket: WsStream) {
    loop {
        read_until_closed(&shared, socket).await;

        // Connection is gone: fail in-flight calls, drop the stale snapshot.
        shared.peer.mark_connected(false);
        shared.peer.clear_tx();
        shared.pending.fail_all(|| GatewayError::ConnectionLost);
        shared.set_context(None);

        if !shared.peer.should_reconnect() {
            debug!("peer reconnect disabled, stopping");
            return;
        }

        socket = match reconnect(&shared).await {
            Some(socket) => socket,
            None => return,
        };
        shared.peer.mark_connected(true);
        info!("reconnected to hub");
    }
}

/// Pump one established connection until it drops.
async fn read_until_closed(shared: &Arc<BridgeShared>, socket: WsStream) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    shared.peer.install_tx(tx.clone());

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        let message = match frame {
            Ok(message) => message,
            Err(err) => {
                debug!(error = %err, "peer read error");
                break;
            }
        };
        match message {
            Message::Text(text) => match BridgeMessage::parse(&text) {
                Ok(BridgeMessage::Response(response)) => {
                    let id = response.id.clone();
                    if !shared.pending.complete(&id, response.into_result()) {
                        debug!(request = %id, "late or unmatched response dropped");
                    }
                }
                Ok(BridgeMessage::Control(ControlMessage::Context { params })) => {
                    shared.set_context(Some(params));
                }
                Ok(_) => {}
                Err(err) => debug!(error = %err, "unparseable hub frame dropped"),
            },
            Message::Ping(payload) => {
                let _ = tx.send(Message::Pong(payload));
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    drop(tx);
    let _ = writer.await;
}

/// Full-jitter backoff loop. `None` means retries were exhausted (or
/// shutdown) and the bridge has degraded.
async fn reconnect(shared: &Arc<BridgeShared>) -> Option<WsStream> {
    let mut attempt: u32 = 0;
    loop {
        if !shared.peer.should_reconnect() {
            return None;
        }
        if attempt >= MAX_RECONNECT_ATTEMPTS {
            warn!(
                attempts = attempt,
                "reconnect attempts exhausted, degrading to stdio-only"
            );
            *shared.mode.write() = BridgeMode::Degraded;
            return None;
        }

        let delay = full_jitter_delay(attempt);
        debug!(attempt, delay_ms = delay.as_millis() as u64, "scheduling reconnect");
        tokio::time::sleep(delay).await;

        if !shared.peer.should_reconnect() {
            return None;
        }
        match connect(shared).await {
            Ok(socket) => return Some(socket),
            Err(err) => {
                attempt += 1;
                debug!(attempt, error = %err, "reconnect attempt failed");
            }
        }
    }
}
