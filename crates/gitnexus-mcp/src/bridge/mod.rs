//! Hub/peer bridge to the browser-hosted graph engine.
//!
//! All daemons on one machine share a single localhost WebSocket port. The
//! first daemon to bind becomes the Hub: it owns the browser connection,
//! broadcasts context pushes, and routes sibling daemons' requests. Later
//! daemons join as Peers and forward their calls through the Hub. When
//! neither role can be established the bridge degrades to stdio-only and
//! every call fails fast with `BROWSER_DISCONNECTED`.
//!
//! ## Election
//!
//! The bind-or-connect race is decided by the atomic `TcpListener::bind`:
//! exactly one of two simultaneously starting daemons wins the port, the
//! loser connects to it. A short handshake timeout guards against the port
//! being held by an unrelated process.

pub mod hub;
pub mod message;
pub mod peer;
pub mod pending;

pub use message::{BridgeMessage, ControlMessage, RequestFrame, ResponseFrame, WireError};
pub use pending::{PendingTable, MAX_PENDING};

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use gitnexus_core::resilience::backoff_ceiling;
use gitnexus_core::{CodebaseContext, Config, GatewayError, GatewayResult};

/// Largest accepted WebSocket frame.
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Application messages per second per connection; excess is dropped.
pub const RATE_LIMIT_PER_SEC: u32 = 50;

/// How long a peer waits for the hub's handshake ack.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// Reconnect attempts before the peer gives up and degrades.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Transport-level frame cap, applied on both the accepting and dialing side.
pub(crate) fn ws_config() -> tokio_tungstenite::tungstenite::protocol::WebSocketConfig {
    let mut config = tokio_tungstenite::tungstenite::protocol::WebSocketConfig::default();
    config.max_message_size = Some(MAX_MESSAGE_SIZE);
    config.max_frame_size = Some(MAX_MESSAGE_SIZE);
    config
}

/// Which role this daemon holds on the shared port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeMode {
    Hub,
    Peer,
    /// Neither bind nor join succeeded; tool calls fail fast.
    Degraded,
}

impl BridgeMode {
    /// Wire value for the health resource.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hub => "hub",
            Self::Peer => "peer",
            Self::Degraded => "unknown",
        }
    }
}

type ContextListener = Box<dyn Fn(Option<CodebaseContext>) + Send + Sync>;

/// State shared between the bridge facade and its connection tasks.
pub(crate) struct BridgeShared {
    pub(crate) config: Config,
    pub(crate) mode: RwLock<BridgeMode>,
    pub(crate) pending: PendingTable,
    context: RwLock<Option<CodebaseContext>>,
    listeners: Mutex<Vec<ContextListener>>,
    pub(crate) hub: hub::HubState,
    pub(crate) peer: peer::PeerState,
}

impl BridgeShared {
    fn new(config: Config) -> Self {
        Self {
            config,
            mode: RwLock::new(BridgeMode::Degraded),
            pending: PendingTable::new(),
            context: RwLock::new(None),
            listeners: Mutex::new(Vec::new()),
            hub: hub::HubState::new(),
            peer: peer::PeerState::new(),
        }
    }

    /// Atomically swap the snapshot and notify every registered listener.
    ///
    /// The lock is released before listeners run; they receive a clone and
    /// never observe a torn snapshot.
    pub(crate) fn set_context(&self, context: Option<CodebaseContext>) {
        *self.context.write() = context.clone();
        let listeners = self.listeners.lock();
        for listener in listeners.iter() {
            listener(context.clone());
        }
    }

    pub(crate) fn context(&self) -> Option<CodebaseContext> {
        self.context.read().clone()
    }
}

/// The bridge facade the MCP server calls into.
pub struct Bridge {
    shared: Arc<BridgeShared>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Bridge {
    /// Perform the hub/peer election and start the connection tasks.
    ///
    /// Never fails: when neither role can be established the bridge comes up
    /// degraded and the daemon still serves MCP requests.
    pub async fn start(config: Config) -> Arc<Self> {
        let shared = Arc::new(BridgeShared::new(config));
        let mut tasks = Vec::new();

        let port = shared.config.port;
        match TcpListener::bind(("127.0.0.1", port)).await {
            Ok(listener) => {
                *shared.mode.write() = BridgeMode::Hub;
                if shared.config.token_is_generated {
                    // Logged exactly once so the browser operator can copy it.
                    info!(token = %shared.config.token, "bridge token generated for this run");
                }
                info!(port, "bridge started as hub");
                tasks.push(tokio::spawn(hub::run_hub(Arc::clone(&shared), listener)));
            }
            Err(bind_err) => {
                info!(port, error = %bind_err, "port taken, joining as peer");
                match peer::connect(&shared).await {
                    Ok(socket) => {
                        *shared.mode.write() = BridgeMode::Peer;
                        shared.peer.mark_connected(true);
                        info!(port, "bridge joined as peer");
                        tasks.push(tokio::spawn(peer::run(Arc::clone(&shared), socket)));
                    }
                    Err(join_err) => {
                        *shared.mode.write() = BridgeMode::Degraded;
                        warn!(
                            port,
                            error = %join_err,
                            "hub and peer mode both failed, running degraded (stdio only)"
                        );
                    }
                }
            }
        }

        Arc::new(Self {
            shared,
            tasks: Mutex::new(tasks),
        })
    }

    /// Send one tool call to the browser and await its response.
    ///
    /// Fails fast with `BROWSER_DISCONNECTED` when not connected and with
    /// `OVERLOADED` past the pending cap. On deadline expiry the pending
    /// entry is removed first, so a late backend response is dropped rather
    /// than double-resolved. Concurrent calls are independent; correlation is
    /// strictly by id.
    pub async fn call_tool(
        &self,
        method: &str,
        params: serde_json::Value,
        deadline: Duration,
    ) -> GatewayResult<serde_json::Value> {
        let id = Uuid::new_v4().to_string();
        let rx = self.shared.pending.insert(id.clone())?;

        let frame = RequestFrame {
            id: id.clone(),
            method: method.to_string(),
            params,
            agent_name: self.shared.config.agent_name.clone(),
            peer_id: None,
        };

        let mode = *self.shared.mode.read();
        let sent = match mode {
            BridgeMode::Hub => self.shared.hub.send_to_browser(&frame),
            BridgeMode::Peer => self.shared.peer.send(&frame),
            BridgeMode::Degraded => Err(GatewayError::BrowserDisconnected),
        };
        if let Err(err) = sent {
            self.shared.pending.cancel(&id);
            return Err(err);
        }

        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(result)) => result,
            // Completion sender dropped without an answer: connection teardown.
            Ok(Err(_)) => Err(GatewayError::ConnectionLost),
            Err(_) => {
                self.shared.pending.cancel(&id);
                Err(GatewayError::Timeout {
                    tool: method.to_string(),
                    elapsed_ms: deadline.as_millis() as u64,
                })
            }
        }
    }

    /// Borrowable copy of the latest context snapshot.
    pub fn context(&self) -> Option<CodebaseContext> {
        self.shared.context()
    }

    /// Register a callback for context snapshot changes (including clears).
    pub fn subscribe_context(&self, listener: impl Fn(Option<CodebaseContext>) + Send + Sync + 'static) {
        self.shared.listeners.lock().push(Box::new(listener));
    }

    pub fn mode(&self) -> BridgeMode {
        *self.shared.mode.read()
    }

    /// Whether the backend is reachable: a hub needs a browser, a peer needs
    /// its hub connection.
    pub fn connected(&self) -> bool {
        match self.mode() {
            BridgeMode::Hub => self.shared.hub.browser_connected(),
            BridgeMode::Peer => self.shared.peer.is_connected(),
            BridgeMode::Degraded => false,
        }
    }

    /// In-flight request count, for logs and tests.
    pub fn pending_len(&self) -> usize {
        self.shared.pending.len()
    }

    /// Expected window within which a disconnected party retries, from the
    /// backoff schedule. The hub only logs this; the browser re-initiates.
    pub fn reconnect_window(attempt: u32) -> Duration {
        backoff_ceiling(attempt)
    }

    /// Tear the bridge down: stop reconnects, close every socket, fail what
    /// is still pending.
    pub async fn shutdown(&self) {
        self.shared.peer.stop_reconnect();
        self.shared.hub.close_all();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.shared
            .pending
            .fail_all(|| GatewayError::ConnectionLost);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use gitnexus_core::{CodebaseStats, Hotspot};
    use serde_json::json;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message;

    /// Reserve a free localhost port by binding and dropping a listener.
    fn free_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    fn test_config(port: u16) -> Config {
        Config {
            port,
            token: "test-token".into(),
            token_is_generated: false,
            agent_name: "test-agent".into(),
            quick_timeout: Duration::from_secs(5),
            heavy_timeout: Duration::from_secs(5),
            debug: false,
        }
    }

    fn sample_context(project: &str) -> CodebaseContext {
        CodebaseContext {
            project_name: project.into(),
            stats: CodebaseStats {
                file_count: 3,
                function_count: 14,
                class_count: 2,
                interface_count: 1,
                method_count: 6,
            },
            hotspots: vec![Hotspot {
                name: "Router".into(),
                kind: "class".into(),
                file_path: "src/router.ts".into(),
                connections: 9,
            }],
            folder_tree: "src/".into(),
        }
    }

    async fn connect_browser(
        port: u16,
    ) -> tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    > {
        let (socket, _) = connect_async(format!("ws://127.0.0.1:{port}"))
            .await
            .expect("browser connects");
        socket
    }

    #[tokio::test]
    async fn degraded_when_port_is_not_a_hub() {
        // Occupy the port with a plain TCP listener that never speaks
        // WebSocket; the join handshake times out and the bridge degrades.
        let port = free_port();
        let _squatter = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .unwrap();

        let bridge = Bridge::start(test_config(port)).await;
        assert_eq!(bridge.mode(), BridgeMode::Degraded);

        let err = bridge
            .call_tool("search", json!({"query": "x"}), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "BROWSER_DISCONNECTED");
        assert_eq!(bridge.pending_len(), 0);
        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn hub_fails_fast_without_browser() {
        let port = free_port();
        let bridge = Bridge::start(test_config(port)).await;
        assert_eq!(bridge.mode(), BridgeMode::Hub);
        assert!(!bridge.connected());

        let err = bridge
            .call_tool("overview", json!({}), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "BROWSER_DISCONNECTED");
        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn hub_round_trip_with_browser() {
        let port = free_port();
        let bridge = Bridge::start(test_config(port)).await;
        let mut browser = connect_browser(port).await;

        // Implicit browser classification via the first context push.
        let push = BridgeMessage::Control(ControlMessage::Context {
            params: sample_context("acme"),
        });
        browser.send(Message::Text(push.to_text())).await.unwrap();

        // Wait until the hub has absorbed the snapshot.
        for _ in 0..50 {
            if bridge.context().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(bridge.context().unwrap().project_name, "acme");
        assert!(bridge.connected());

        // The browser answers the next request it sees.
        let call = tokio::spawn({
            let bridge = Arc::clone(&bridge);
            async move {
                bridge
                    .call_tool("search", json!({"query": "auth"}), Duration::from_secs(5))
                    .await
            }
        });

        let frame = loop {
            match browser.next().await.expect("frame").unwrap() {
                Message::Text(text) => match BridgeMessage::parse(&text).unwrap() {
                    BridgeMessage::Request(req) => break req,
                    _ => continue,
                },
                _ => continue,
            }
        };
        assert_eq!(frame.method, "search");
        assert_eq!(frame.agent_name, "test-agent");
        assert!(frame.peer_id.is_none());

        let reply = BridgeMessage::Response(ResponseFrame {
            id: frame.id,
            result: Some(json!({"matches": 3})),
            error: None,
            peer_id: None,
        });
        browser.send(Message::Text(reply.to_text())).await.unwrap();

        let result = call.await.unwrap().unwrap();
        assert_eq!(result, json!({"matches": 3}));
        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn late_response_after_timeout_is_dropped() {
        let port = free_port();
        let bridge = Bridge::start(test_config(port)).await;
        let mut browser = connect_browser(port).await;
        browser
            .send(Message::Text(
                BridgeMessage::Control(ControlMessage::Context {
                    params: sample_context("acme"),
                })
                .to_text(),
            ))
            .await
            .unwrap();

        for _ in 0..50 {
            if bridge.connected() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        // Backend never answers inside the deadline.
        let err = bridge
            .call_tool("cypher", json!({"query": "MATCH (n) RETURN n"}), Duration::from_millis(200))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "TIMEOUT");
        assert_eq!(bridge.pending_len(), 0);

        // A late answer bearing the timed-out id must be swallowed.
        let frame = loop {
            match browser.next().await.expect("frame").unwrap() {
                Message::Text(text) => match BridgeMessage::parse(&text).unwrap() {
                    BridgeMessage::Request(req) => break req,
                    _ => continue,
                },
                _ => continue,
            }
        };
        browser
            .send(Message::Text(
                BridgeMessage::Response(ResponseFrame {
                    id: frame.id,
                    result: Some(json!("too late")),
                    error: None,
                    peer_id: None,
                })
                .to_text(),
            ))
            .await
            .unwrap();

        // Give the hub a beat to process; nothing should resolve or panic.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(bridge.pending_len(), 0);
        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn peer_calls_route_through_hub_to_browser_and_back() {
        let port = free_port();
        let hub = Bridge::start(test_config(port)).await;
        assert_eq!(hub.mode(), BridgeMode::Hub);

        let mut browser = connect_browser(port).await;
        browser
            .send(Message::Text(
                BridgeMessage::Control(ControlMessage::Context {
                    params: sample_context("acme"),
                })
                .to_text(),
            ))
            .await
            .unwrap();

        let peer = Bridge::start(test_config(port)).await;
        assert_eq!(peer.mode(), BridgeMode::Peer);

        // Context broadcast reaches the peer.
        for _ in 0..100 {
            if peer.context().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(peer.context().unwrap().project_name, "acme");

        // A peer call arrives at the browser stamped with a peer_id...
        let call = tokio::spawn({
            let peer = Arc::clone(&peer);
            async move {
                peer.call_tool("overview", json!({"limit": 20}), Duration::from_secs(5))
                    .await
            }
        });

        let frame = loop {
            match browser.next().await.expect("frame").unwrap() {
                Message::Text(text) => match BridgeMessage::parse(&text).unwrap() {
                    BridgeMessage::Request(req) => break req,
                    _ => continue,
                },
                _ => continue,
            }
        };
        assert_eq!(frame.method, "overview");
        let peer_id = frame.peer_id.clone().expect("hub stamps peer_id");

        // ...and the response routes back to that peer only.
        browser
            .send(Message::Text(
                BridgeMessage::Response(ResponseFrame {
                    id: frame.id,
                    result: Some(json!({"clusters": 4})),
                    error: None,
                    peer_id: Some(peer_id),
                })
                .to_text(),
            ))
            .await
            .unwrap();

        let result = call.await.unwrap().unwrap();
        assert_eq!(result, json!({"clusters": 4}));
        assert_eq!(hub.pending_len(), 0);
        assert_eq!(peer.pending_len(), 0);

        peer.shutdown().await;
        hub.shutdown().await;
    }

    #[tokio::test]
    async fn peer_with_wrong_token_is_rejected() {
        let port = free_port();
        let hub = Bridge::start(test_config(port)).await;
        assert_eq!(hub.mode(), BridgeMode::Hub);

        let mut bad = test_config(port);
        bad.token = "wrong".into();
        let peer = Bridge::start(bad).await;
        assert_eq!(peer.mode(), BridgeMode::Degraded);

        peer.shutdown().await;
        hub.shutdown().await;
    }

    #[tokio::test]
    async fn browser_disconnect_clears_context() {
        let port = free_port();
        let bridge = Bridge::start(test_config(port)).await;
        let mut browser = connect_browser(port).await;
        browser
            .send(Message::Text(
                BridgeMessage::Control(ControlMessage::Context {
                    params: sample_context("acme"),
                })
                .to_text(),
            ))
            .await
            .unwrap();

        for _ in 0..50 {
            if bridge.context().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        browser.close(None).await.unwrap();
        for _ in 0..100 {
            if bridge.context().is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(bridge.context().is_none());
        assert!(!bridge.connected());
        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn context_is_last_wins() {
        let port = free_port();
        let bridge = Bridge::start(test_config(port)).await;
        let mut browser = connect_browser(port).await;

        for name in ["s1", "s2"] {
            browser
                .send(Message::Text(
                    BridgeMessage::Control(ControlMessage::Context {
                        params: sample_context(name),
                    })
                    .to_text(),
                ))
                .await
                .unwrap();
        }

        for _ in 0..100 {
            if bridge
                .context()
                .map(|c| c.project_name == "s2")
                .unwrap_or(false)
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(bridge.context().unwrap().project_name, "s2");
        bridge.shutdown().await;
    }
}
