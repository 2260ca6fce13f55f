//! Request handlers for MCP methods.

pub mod helpers;
pub mod resources;
pub mod tools_call;

use std::sync::Arc;

use tracing::{debug, info};

use gitnexus_core::resilience::{CircuitBreaker, ToolTimeouts};
use gitnexus_core::Config;

use crate::bridge::Bridge;
use crate::protocol::{error_codes, methods, RequestId, RpcRequest, RpcResponse};
use crate::tools::{register_all_tools, ToolRegistry};

/// Request handlers.
///
/// Holds the immutable tool registry and the process-global resilience
/// singletons next to the bridge handle; shared across concurrent request
/// tasks behind an `Arc`.
pub struct Handlers {
    registry: ToolRegistry,
    bridge: Arc<Bridge>,
    breaker: Arc<CircuitBreaker>,
    timeouts: ToolTimeouts,
    config: Config,
}

impl Handlers {
    /// Create new handlers with the given dependencies.
    pub fn new(bridge: Arc<Bridge>, breaker: Arc<CircuitBreaker>, config: Config) -> Self {
        Self {
            registry: register_all_tools(),
            timeouts: ToolTimeouts::from_config(&config),
            bridge,
            breaker,
            config,
        }
    }

    /// Dispatch a request to the appropriate handler.
    pub async fn dispatch(&self, request: RpcRequest) -> RpcResponse {
        debug!(method = %request.method, "dispatching request");

        if request.jsonrpc != "2.0" {
            return RpcResponse::fail(
                request.id,
                error_codes::INVALID_REQUEST,
                "Invalid JSON-RPC version. Expected '2.0'.",
            );
        }

        match request.method.as_str() {
            // MCP lifecycle methods
            methods::INITIALIZE => self.handle_initialize(request.id),
            methods::INITIALIZED_NOTIFICATION => self.handle_initialized_notification(),
            methods::PING => RpcResponse::ok(request.id, serde_json::json!({})),

            // MCP tools protocol
            methods::TOOLS_LIST => self.handle_tools_list(request.id),
            methods::TOOLS_CALL => self.handle_tools_call(request.id, request.params).await,

            // MCP resources protocol
            methods::RESOURCES_LIST => self.handle_resources_list(request.id),
            methods::RESOURCES_READ => self.handle_resources_read(request.id, request.params),

            _ => RpcResponse::fail(
                request.id,
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            ),
        }
    }

    /// Handle MCP initialize request.
    ///
    /// Returns server capabilities following the MCP protocol specification.
    fn handle_initialize(&self, id: Option<RequestId>) -> RpcResponse {
        info!("handling initialize request");

        RpcResponse::ok(
            id,
            serde_json::json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {
                    "tools": { "listChanged": false },
                    "resources": { "listChanged": true }
                },
                "serverInfo": {
                    "name": "gitnexus-mcp",
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        )
    }

    /// Handle notifications/initialized - a notification, not a request.
    ///
    /// Notifications don't receive a response per JSON-RPC 2.0.
    fn handle_initialized_notification(&self) -> RpcResponse {
        info!("client initialized notification received");
        RpcResponse::none()
    }

    /// Handle tools/list request.
    ///
    /// Returns the fixed 15-tool catalogue with input schemas.
    fn handle_tools_list(&self, id: Option<RequestId>) -> RpcResponse {
        debug!("handling tools/list request");
        let tools = self.registry.list();
        RpcResponse::ok(id, serde_json::json!({ "tools": tools }))
    }

    pub(crate) fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub(crate) fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    pub(crate) fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub(crate) fn timeouts(&self) -> ToolTimeouts {
        self.timeouts
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use gitnexus_core::resilience::CircuitBreaker;
    use gitnexus_core::Config;

    use crate::bridge::Bridge;
    use crate::protocol::{error_codes, RequestId, RpcRequest};

    use super::Handlers;

    fn free_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    async fn handlers() -> (Handlers, Arc<Bridge>) {
        let config = Config {
            port: free_port(),
            token: "t".into(),
            token_is_generated: false,
            agent_name: "test-agent".into(),
            quick_timeout: Duration::from_secs(1),
            heavy_timeout: Duration::from_secs(1),
            debug: false,
        };
        let bridge = Bridge::start(config.clone()).await;
        (
            Handlers::new(Arc::clone(&bridge), Arc::new(CircuitBreaker::new()), config),
            bridge,
        )
    }

    fn request(method: &str, id: i64) -> RpcRequest {
        RpcRequest {
            jsonrpc: "2.0".into(),
            id: Some(RequestId::Num(id)),
            method: method.into(),
            params: None,
        }
    }

    #[tokio::test]
    async fn initialize_advertises_tools_and_resources() {
        let (handlers, bridge) = handlers().await;
        let response = handlers.dispatch(request("initialize", 1)).await;
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert!(result["capabilities"]["tools"].is_object());
        assert!(result["capabilities"]["resources"].is_object());
        assert_eq!(result["serverInfo"]["name"], "gitnexus-mcp");
        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn initialized_notification_gets_no_response() {
        let (handlers, bridge) = handlers().await;
        let notification = RpcRequest {
            jsonrpc: "2.0".into(),
            id: None,
            method: "notifications/initialized".into(),
            params: None,
        };
        let response = handlers.dispatch(notification).await;
        assert!(response.is_none_marker());
        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn tools_list_is_idempotent() {
        let (handlers, bridge) = handlers().await;
        let first = handlers.dispatch(request("tools/list", 1)).await;
        let second = handlers.dispatch(request("tools/list", 2)).await;
        assert_eq!(first.result, second.result);
        let tools = first.result.unwrap()["tools"].clone();
        assert_eq!(tools.as_array().unwrap().len(), 15);
        // Agent-facing schemas use the camelCase key.
        assert!(tools[0].get("inputSchema").is_some());
        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let (handlers, bridge) = handlers().await;
        let response = handlers.dispatch(request("tools/subscribe", 1)).await;
        assert_eq!(response.error.unwrap().code, error_codes::METHOD_NOT_FOUND);
        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn wrong_jsonrpc_version_is_rejected() {
        let (handlers, bridge) = handlers().await;
        let bad = RpcRequest {
            jsonrpc: "1.0".into(),
            id: Some(RequestId::Num(1)),
            method: "ping".into(),
            params: None,
        };
        let response = handlers.dispatch(bad).await;
        assert_eq!(response.error.unwrap().code, error_codes::INVALID_REQUEST);
        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn ping_answers_empty_object() {
        let (handlers, bridge) = handlers().await;
        let response = handlers.dispatch(request("ping", 7)).await;
        assert_eq!(response.result.unwrap(), json!({}));
        bridge.shutdown().await;
    }
}
