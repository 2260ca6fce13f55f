//! Hub role: owns the shared port, the browser connection, and peer routing.
//!
//! The hub accepts WebSocket connections from two kinds of clients and
//! classifies each by its first message: peers announce themselves with a
//! token handshake, the browser is recognized implicitly by its first
//! context push. Requests from peers are stamped with their `peer_id` before
//! forwarding, and responses route back by that same id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Instant;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use regex::Regex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{
    Request as WsRequest, Response as WsResponse,
};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use uuid::Uuid;

use gitnexus_core::{GatewayError, GatewayResult};

use super::message::{BridgeMessage, ControlMessage, ResponseFrame};
use super::{ws_config, BridgeShared, RATE_LIMIT_PER_SEC};

/// Monotonic per-connection tags for log correlation.
static CONNECTION_COUNTER: AtomicU64 = AtomicU64::new(0);

fn origin_regex() -> &'static Regex {
    static ORIGIN: OnceLock<Regex> = OnceLock::new();
    ORIGIN.get_or_init(|| {
        Regex::new(r"^https?://(localhost|127\.0\.0\.1)(:\d+)?$").expect("origin regex compiles")
    })
}

/// True for an empty/absent Origin (non-browser clients) or a localhost one.
fn origin_allowed(origin: Option<&str>) -> bool {
    match origin {
        None => true,
        Some(value) => value.is_empty() || origin_regex().is_match(value),
    }
}

// ============================================================================
// Hub connection registry
// ============================================================================

struct BrowserHandle {
    tx: mpsc::UnboundedSender<Message>,
    conn_tag: String,
}

struct PeerHandle {
    tx: mpsc::UnboundedSender<Message>,
    #[allow(dead_code)] // kept for log correlation on routing failures
    agent_name: String,
}

/// Connected clients, hub mode only.
pub(crate) struct HubState {
    browser: Mutex<Option<BrowserHandle>>,
    peers: Mutex<HashMap<String, PeerHandle>>,
}

impl HubState {
    pub(crate) fn new() -> Self {
        Self {
            browser: Mutex::new(None),
            peers: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn browser_connected(&self) -> bool {
        self.browser.lock().is_some()
    }

    /// Forward a locally-originated request to the browser.
    pub(crate) fn send_to_browser(&self, frame: &super::RequestFrame) -> GatewayResult<()> {
        let text = BridgeMessage::Request(frame.clone()).to_text();
        self.send_text_to_browser(text)
    }

    fn send_text_to_browser(&self, text: String) -> GatewayResult<()> {
        let browser = self.browser.lock();
        match browser.as_ref() {
            Some(handle) => handle
                .tx
                .send(Message::Text(text))
                .map_err(|_| GatewayError::BrowserDisconnected),
            None => Err(GatewayError::BrowserDisconnected),
        }
    }

    fn send_text_to_peer(&self, peer_id: &str, text: String) -> bool {
        let peers = self.peers.lock();
        match peers.get(peer_id) {
            Some(handle) => handle.tx.send(Message::Text(text)).is_ok(),
            None => false,
        }
    }

    fn broadcast_to_peers(&self, text: &str) {
        let peers = self.peers.lock();
        for handle in peers.values() {
            let _ = handle.tx.send(Message::Text(text.to_string()));
        }
    }

    /// Install a new browser connection, closing any previous one.
    fn replace_browser(&self, handle: BrowserHandle) {
        let previous = self.browser.lock().replace(handle);
        if let Some(old) = previous {
            info!(conn = %old.conn_tag, "new browser connection replaces the old one");
            let _ = old.tx.send(Message::Close(None));
        }
    }

    /// Drop the browser entry if it still belongs to `conn_tag`.
    fn clear_browser_if(&self, conn_tag: &str) -> bool {
        let mut browser = self.browser.lock();
        if browser.as_ref().map(|b| b.conn_tag.as_str()) == Some(conn_tag) {
            *browser = None;
            true
        } else {
            false
        }
    }

    fn remove_peer(&self, peer_id: &str) {
        self.peers.lock().remove(peer_id);
    }

    /// Drop every connection sender; writer tasks end and sockets close.
    pub(crate) fn close_all(&self) {
        *self.browser.lock() = None;
        self.peers.lock().clear();
    }
}

// ============================================================================
// Accept loop
// ============================================================================

/// Accept connections on the shared port until the bridge shuts down.
pub(crate) async fn run_hub(shared: Arc<BridgeShared>, listener: TcpListener) {
    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(err) => {
                // Most accept errors are transient; keep the hub alive.
                warn!(error = %err, "failed to accept bridge connection");
                continue;
            }
        };

        let conn_id = CONNECTION_COUNTER.fetch_add(1, Ordering::Relaxed);
        let conn_tag = format!("C{conn_id:03}");
        debug!(conn = %conn_tag, addr = %peer_addr, "bridge connection accepted");

        let shared = Arc::clone(&shared);
        tokio::spawn(async move {
            if let Err(err) = handle_connection(shared, stream, conn_tag.clone()).await {
                debug!(conn = %conn_tag, error = %err, "bridge connection ended");
            }
        });
    }
}

/// Role a connection currently holds.
enum ConnRole {
    Unclassified,
    /// Handshake accepted, `register_peer` not yet seen.
    PeerPending,
    Peer(String),
    Browser,
}

/// Fixed-window message budget, reset every second.
struct RateWindow {
    window_start: Instant,
    count: u32,
}

impl RateWindow {
    fn new() -> Self {
        Self {
            window_start: Instant::now(),
            count: 0,
        }
    }

    /// Count one message; false means drop it silently.
    fn allow(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.window_start).as_secs() >= 1 {
            self.window_start = now;
            self.count = 0;
        }
        self.count += 1;
        self.count <= RATE_LIMIT_PER_SEC
    }
}

async fn handle_connection(
    shared: Arc<BridgeShared>,
    stream: TcpStream,
    conn_tag: String,
) -> anyhow::Result<()> {
    // Capture the Origin header during the HTTP upgrade.
    let origin_slot: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let origin_capture = Arc::clone(&origin_slot);
    let callback = move |req: &WsRequest, resp: WsResponse| {
        let origin = req
            .headers()
            .get("origin")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        *origin_capture.lock() = origin;
        Ok(resp)
    };

    let mut socket =
        tokio_tungstenite::accept_hdr_async_with_config(stream, callback, Some(ws_config()))
            .await?;

    let origin = origin_slot.lock().clone();
    if !origin_allowed(origin.as_deref()) {
        warn!(conn = %conn_tag, origin = ?origin, "rejecting non-local origin");
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: CloseCode::Library(4003),
                reason: "origin not allowed".into(),
            })))
            .await;
        return Ok(());
    }

    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    // Writer task: everything this connection is sent funnels through here.
    let writer_tag = conn_tag.clone();
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if sink.send(message).await.is_err() {
                break;
            }
            if closing {
                break;
            }
        }
        debug!(conn = %writer_tag, "bridge writer closed");
    });

    let mut role = ConnRole::Unclassified;
    let mut rate = RateWindow::new();

    while let Some(frame) = stream.next().await {
        let message = match frame {
            Ok(message) => message,
            Err(err) => {
                debug!(conn = %conn_tag, error = %err, "bridge read error");
                break;
            }
        };

        match message {
            Message::Text(text) => {
                if !rate.allow() {
                    // Silent drop per the rate-limit contract.
                    continue;
                }
                let parsed = match BridgeMessage::parse(&text) {
                    Ok(parsed) => parsed,
                    Err(err) => {
                        debug!(conn = %conn_tag, error = %err, "unparseable bridge frame dropped");
                        continue;
                    }
                };
                if handle_frame(&shared, &conn_tag, &tx, &mut role, parsed, &text) {
                    break;
                }
            }
            Message::Ping(payload) => {
                let _ = tx.send(Message::Pong(payload));
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    // Connection teardown.
    match role {
        ConnRole::Browser => {
            if shared.hub.clear_browser_if(&conn_tag) {
                shared.set_context(None);
                info!(
                    conn = %conn_tag,
                    expected_reconnect = ?super::Bridge::reconnect_window(0),
                    "browser disconnected, context cleared; browser re-dials on its own schedule"
                );
            }
        }
        ConnRole::Peer(peer_id) => {
            shared.hub.remove_peer(&peer_id);
            info!(conn = %conn_tag, peer_id = %peer_id, "peer disconnected");
        }
        _ => {}
    }

    drop(tx);
    let _ = writer.await;
    Ok(())
}

/// Handle one parsed frame. Returns true when the connection must close.
fn handle_frame(
    shared: &Arc<BridgeShared>,
    conn_tag: &str,
    tx: &mpsc::UnboundedSender<Message>,
    role: &mut ConnRole,
    parsed: BridgeMessage,
    raw_text: &str,
) -> bool {
    match parsed {
        BridgeMessage::Control(ControlMessage::Handshake { id, token }) => {
            if !matches!(role, ConnRole::Unclassified) {
                debug!(conn = %conn_tag, "duplicate handshake ignored");
                return false;
            }
            if token == shared.config.token {
                let ack = BridgeMessage::Control(ControlMessage::HandshakeAck { id });
                let _ = tx.send(Message::Text(ack.to_text()));
                *role = ConnRole::PeerPending;
            } else {
                warn!(conn = %conn_tag, "handshake token mismatch");
                let nack = BridgeMessage::Control(ControlMessage::HandshakeNack {
                    id,
                    error: Some("invalid token".to_string()),
                });
                let _ = tx.send(Message::Text(nack.to_text()));
                let _ = tx.send(Message::Close(Some(CloseFrame {
                    code: CloseCode::Library(4001),
                    reason: "invalid token".into(),
                })));
                return true;
            }
            false
        }

        BridgeMessage::Control(ControlMessage::RegisterPeer { agent_name }) => {
            if matches!(role, ConnRole::PeerPending) {
                let peer_id = Uuid::new_v4().to_string();
                shared.hub.peers.lock().insert(
                    peer_id.clone(),
                    PeerHandle {
                        tx: tx.clone(),
                        agent_name: agent_name.clone(),
                    },
                );
                info!(conn = %conn_tag, peer_id = %peer_id, agent = %agent_name, "peer registered");
                *role = ConnRole::Peer(peer_id);
            } else {
                debug!(conn = %conn_tag, "register_peer without handshake ignored");
            }
            false
        }

        BridgeMessage::Control(ControlMessage::Context { params }) => {
            if matches!(role, ConnRole::Peer(_) | ConnRole::PeerPending) {
                debug!(conn = %conn_tag, "context push from a peer ignored");
                return false;
            }
            if !matches!(role, ConnRole::Browser) {
                // Implicit classification: the context sender is the browser.
                shared.hub.replace_browser(BrowserHandle {
                    tx: tx.clone(),
                    conn_tag: conn_tag.to_string(),
                });
                *role = ConnRole::Browser;
                info!(conn = %conn_tag, project = %params.project_name, "browser connected");
            }
            shared.set_context(Some(params));
            shared.hub.broadcast_to_peers(raw_text);
            false
        }

        // The hub never receives these; a confused client is just noisy.
        BridgeMessage::Control(ControlMessage::HandshakeAck { .. })
        | BridgeMessage::Control(ControlMessage::HandshakeNack { .. }) => false,

        BridgeMessage::Request(mut frame) => {
            let peer_id = match role {
                ConnRole::Peer(peer_id) => peer_id.clone(),
                _ => {
                    debug!(conn = %conn_tag, "request from unregistered connection dropped");
                    return false;
                }
            };
            frame.peer_id = Some(peer_id.clone());
            let text = BridgeMessage::Request(frame.clone()).to_text();
            if shared.hub.send_text_to_browser(text).is_err() {
                // No browser: synthesize the error straight back to the peer.
                let response = BridgeMessage::Response(ResponseFrame::browser_disconnected(
                    frame.id,
                    Some(peer_id.clone()),
                ));
                shared.hub.send_text_to_peer(&peer_id, response.to_text());
            }
            false
        }

        BridgeMessage::Response(frame) => {
            route_response(shared, frame, raw_text);
            false
        }
    }
}

/// Route a response to exactly one recipient: the originating peer when its
/// id is known, the local pending table otherwise.
fn route_response(shared: &Arc<BridgeShared>, frame: ResponseFrame, raw_text: &str) {
    if let Some(peer_id) = frame.peer_id.as_deref() {
        if shared.hub.send_text_to_peer(peer_id, raw_text.to_string()) {
            return;
        }
        debug!(peer_id, request = %frame.id, "response for unknown peer, resolving locally");
    }
    let id = frame.id.clone();
    if !shared.pending.complete(&id, frame.into_result()) {
        // Entry already timed out or was never ours: drop silently.
        debug!(request = %id, "late or unmatched response dropped");
    }
}
