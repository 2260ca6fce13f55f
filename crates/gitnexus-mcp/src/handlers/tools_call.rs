//! The tools/call pipeline.
//!
//! Order is load-bearing: registry lookup, schema validation and the cypher
//! firewall all reject before the circuit breaker or the bridge are touched,
//! so bad input never burns a breaker slot or a pending-table entry.

use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures_util::FutureExt;
use serde_json::json;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use gitnexus_core::GatewayError;

use crate::firewall;
use crate::protocol::{error_codes, RequestId, RpcResponse};
use crate::tools::ToolCategory;
use crate::validation::{self, ToolArgs};

use super::Handlers;

impl Handlers {
    pub(crate) async fn handle_tools_call(
        &self,
        id: Option<RequestId>,
        params: Option<serde_json::Value>,
    ) -> RpcResponse {
        let params = match params {
            Some(p) => p,
            None => {
                return RpcResponse::fail(
                    id,
                    error_codes::INVALID_PARAMS,
                    "Missing params for tools/call",
                );
            }
        };

        let tool_name = match params.get("name").and_then(|v| v.as_str()) {
            Some(n) => n.to_string(),
            None => {
                return RpcResponse::fail(
                    id,
                    error_codes::INVALID_PARAMS,
                    "Missing 'name' parameter in tools/call",
                );
            }
        };

        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

        // Child logger scope: every line for this call carries the same
        // request id, tool and agent.
        let request_id = Uuid::new_v4().to_string();
        let agent_name = self.config().agent_name.clone();
        let span = tracing::info_span!(
            "tool_call",
            request_id = %request_id,
            tool = %tool_name,
            agent = %agent_name
        );
        let started = Instant::now();

        // A panicking handler becomes a typed INTERNAL_ERROR envelope; the
        // daemon never dies because one tool call blew up.
        let response = match AssertUnwindSafe(self.run_tool_pipeline(id.clone(), &tool_name, arguments))
            .catch_unwind()
            .instrument(span.clone())
            .await
        {
            Ok(response) => response,
            Err(_) => {
                span.in_scope(|| error!("tool handler panicked"));
                self.tool_error(
                    id,
                    &GatewayError::Internal {
                        message: format!("tool handler for '{tool_name}' panicked"),
                    },
                )
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        let outcome = match &response.result {
            Some(result) if result["isError"] == json!(true) => "error",
            Some(_) => "success",
            None => "error",
        };
        span.in_scope(|| info!(duration_ms, outcome, "tool call finished"));

        response
    }

    async fn run_tool_pipeline(
        &self,
        id: Option<RequestId>,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> RpcResponse {
        // 1. Unknown tools never reach the bridge.
        let tool = match self.registry().get(tool_name) {
            Some(tool) => tool,
            None => {
                warn!("unknown tool requested");
                return self.tool_error(
                    id,
                    &GatewayError::ToolNotFound {
                        name: tool_name.to_string(),
                    },
                );
            }
        };

        // 2. Schema validation; failures don't consume a breaker slot.
        let mut args = match validation::validate(tool_name, &arguments) {
            Ok(args) => args,
            Err(err) => {
                debug!(error = %err, "argument validation failed");
                return self.tool_error(id, &err);
            }
        };

        // 3. The graph-query tool additionally passes the read-only firewall;
        //    the trimmed query replaces the original argument.
        if let ToolArgs::Cypher(cypher) = &mut args {
            match firewall::check(&cypher.query) {
                Ok(normalized) => cypher.query = normalized,
                Err(err) => {
                    warn!(error = %err, "cypher query rejected");
                    return self.tool_error(id, &err);
                }
            }
        }

        // 4. Breaker admission before the bridge is invoked.
        if let Err(retry_after) = self.breaker().try_acquire() {
            debug!(retry_after, "circuit open, failing fast");
            return self.tool_error(id, &GatewayError::CircuitOpen { retry_after });
        }

        // 5. The timed backend call.
        let deadline = match tool.category {
            ToolCategory::Quick => self.timeouts().quick,
            ToolCategory::Heavy => self.timeouts().heavy,
        };
        let result = self
            .bridge()
            .call_tool(args.method(), args.params(), deadline)
            .await;

        // 6. Breaker accounting and the response envelope.
        match result {
            Ok(data) => {
                self.breaker().record_success();
                self.tool_result(id, data)
            }
            Err(err) => {
                match &err {
                    // Only calls that reached the backend and died there count
                    // against the breaker.
                    GatewayError::Timeout { .. } => self.breaker().record_failure(),
                    _ => self.breaker().record_aborted(),
                }
                warn!(code = err.code(), "tool call failed");
                self.tool_error(id, &err)
            }
        }
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
    use crate::protocol::{RequestId, RpcResponse};

    use super::super::Handlers;

    fn free_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    fn test_config(port: u16) -> Config {
        Config {
            port,
            token: "t".into(),
            token_is_generated: false,
            agent_name: "test-agent".into(),
            quick_timeout: Duration::from_millis(300),
            heavy_timeout: Duration::from_millis(300),
            debug: false,
        }
    }

    /// A handler wired to a hub bridge with no browser: every admitted call
    /// fails with BROWSER_DISCONNECTED, which is exactly what the pipeline
    /// tests need.
    async fn handlers() -> (Handlers, Arc<Bridge>) {
        let config = test_config(free_port());
        let bridge = Bridge::start(config.clone()).await;
        let breaker = Arc::new(CircuitBreaker::new());
        (
            Handlers::new(Arc::clone(&bridge), breaker, config),
            bridge,
        )
    }

    fn envelope(response: &RpcResponse) -> serde_json::Value {
        let result = response.result.as_ref().expect("tool responses are results");
        assert_eq!(result["isError"], json!(true));
        let text = result["content"][0]["text"].as_str().unwrap();
        serde_json::from_str(text).unwrap()
    }

    #[tokio::test]
    async fn unknown_tool_never_reaches_the_bridge() {
        let (handlers, bridge) = handlers().await;
        let response = handlers
            .handle_tools_call(
                Some(RequestId::Num(1)),
                Some(json!({"name": "scan_everything", "arguments": {}})),
            )
            .await;
        let envelope = envelope(&response);
        assert_eq!(envelope["code"], "TOOL_NOT_FOUND");
        assert_eq!(bridge.pending_len(), 0);
        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn validation_failure_skips_bridge_and_breaker() {
        let (handlers, bridge) = handlers().await;
        let response = handlers
            .handle_tools_call(
                Some(RequestId::Num(1)),
                Some(json!({"name": "search", "arguments": {"query": "", "limit": 5}})),
            )
            .await;
        let envelope = envelope(&response);
        assert_eq!(envelope["code"], "VALIDATION_ERROR");
        let issues = envelope["details"]["issues"].as_array().unwrap();
        assert_eq!(issues[0]["path"], "query");
        assert!(issues[0]["message"]
            .as_str()
            .unwrap()
            .contains("cannot be empty"));
        assert_eq!(handlers.breaker().consecutive_failures(), 0);
        assert_eq!(bridge.pending_len(), 0);
        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn forbidden_cypher_names_the_keyword() {
        let (handlers, bridge) = handlers().await;
        let response = handlers
            .handle_tools_call(
                Some(RequestId::Num(2)),
                Some(json!({
                    "name": "cypher",
                    "arguments": {"query": "MATCH (n) DETACH DELETE n RETURN 1"}
                })),
            )
            .await;
        let envelope = envelope(&response);
        assert_eq!(envelope["code"], "CYPHER_FORBIDDEN");
        let keyword = envelope["details"]["keyword"].as_str().unwrap();
        assert!(keyword == "DETACH" || keyword == "DELETE");
        assert_eq!(handlers.breaker().consecutive_failures(), 0);
        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn disconnected_bridge_yields_typed_error() {
        let (handlers, bridge) = handlers().await;
        let response = handlers
            .handle_tools_call(
                Some(RequestId::Num(3)),
                Some(json!({"name": "overview", "arguments": {}})),
            )
            .await;
        let envelope = envelope(&response);
        assert_eq!(envelope["code"], "BROWSER_DISCONNECTED");
        assert_eq!(envelope["retryable"], json!(true));
        assert!(envelope["suggestion"].as_str().unwrap().contains("browser"));
        // Not counted against the breaker.
        assert_eq!(handlers.breaker().consecutive_failures(), 0);
        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn five_timeouts_open_the_circuit() {
        use futures_util::StreamExt;
        use tokio_tungstenite::connect_async;
        use tokio_tungstenite::tungstenite::Message;

        use crate::bridge::{BridgeMessage, ControlMessage};
        use gitnexus_core::{CodebaseContext, CodebaseStats};

        let config = test_config(free_port());
        let port = config.port;
        let bridge = Bridge::start(config.clone()).await;
        let handlers = Handlers::new(Arc::clone(&bridge), Arc::new(CircuitBreaker::new()), config);

        // A browser that swallows every request without answering, so each
        // admitted call times out against the 300ms test deadline.
        let (mut browser, _) = connect_async(format!("ws://127.0.0.1:{port}"))
            .await
            .unwrap();
        use futures_util::SinkExt;
        browser
            .send(Message::Text(
                BridgeMessage::Control(ControlMessage::Context {
                    params: CodebaseContext {
                        project_name: "acme".into(),
                        stats: CodebaseStats::default(),
                        hotspots: vec![],
                        folder_tree: String::new(),
                    },
                })
                .to_text(),
            ))
            .await
            .unwrap();
        tokio::spawn(async move { while browser.next().await.is_some() {} });

        for _ in 0..50 {
            if bridge.connected() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        for attempt in 0..5i64 {
            let response = handlers
                .handle_tools_call(
                    Some(RequestId::Num(attempt)),
                    Some(json!({"name": "search", "arguments": {"query": "x"}})),
                )
                .await;
            assert_eq!(envelope(&response)["code"], "TIMEOUT");
        }

        // The 6th call fails fast without touching the bridge.
        let response = handlers
            .handle_tools_call(
                Some(RequestId::Num(6)),
                Some(json!({"name": "search", "arguments": {"query": "x"}})),
            )
            .await;
        let envelope = envelope(&response);
        assert_eq!(envelope["code"], "CIRCUIT_OPEN");
        let retry_after = envelope["retry_after"].as_u64().unwrap();
        assert!(retry_after > 0 && retry_after <= 30);
        assert_eq!(bridge.pending_len(), 0);
        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn permitted_cypher_reaches_the_browser_trimmed() {
        use futures_util::{SinkExt, StreamExt};
        use tokio_tungstenite::connect_async;
        use tokio_tungstenite::tungstenite::Message;

        use crate::bridge::{BridgeMessage, ControlMessage, ResponseFrame};
        use gitnexus_core::{CodebaseContext, CodebaseStats};

        let config = test_config(free_port());
        let port = config.port;
        let bridge = Bridge::start(config.clone()).await;
        let handlers = Arc::new(Handlers::new(
            Arc::clone(&bridge),
            Arc::new(CircuitBreaker::new()),
            config,
        ));

        let (mut browser, _) = connect_async(format!("ws://127.0.0.1:{port}"))
            .await
            .unwrap();
        browser
            .send(Message::Text(
                BridgeMessage::Control(ControlMessage::Context {
                    params: CodebaseContext {
                        project_name: "acme".into(),
                        stats: CodebaseStats::default(),
                        hotspots: vec![],
                        folder_tree: String::new(),
                    },
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

        let call = tokio::spawn({
            let handlers = Arc::clone(&handlers);
            async move {
                handlers
                    .handle_tools_call(
                        Some(RequestId::Num(1)),
                        Some(json!({
                            "name": "cypher",
                            "arguments": {"query": "  MATCH (n:File) RETURN n.name LIMIT 10  "}
                        })),
                    )
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
        assert_eq!(frame.method, "cypher");
        assert_eq!(frame.params["query"], "MATCH (n:File) RETURN n.name LIMIT 10");

        browser
            .send(Message::Text(
                BridgeMessage::Response(ResponseFrame {
                    id: frame.id,
                    result: Some(json!({"rows": []})),
                    error: None,
                    peer_id: None,
                })
                .to_text(),
            ))
            .await
            .unwrap();

        let response = call.await.unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["isError"], json!(false));
        let text = result["content"][0]["text"].as_str().unwrap();
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(text).unwrap(),
            json!({"rows": []})
        );
        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn missing_name_is_invalid_params() {
        let (handlers, bridge) = handlers().await;
        let response = handlers
            .handle_tools_call(Some(RequestId::Num(4)), Some(json!({"arguments": {}})))
            .await;
        assert_eq!(
            response.error.unwrap().code,
            crate::protocol::error_codes::INVALID_PARAMS
        );
        bridge.shutdown().await;
    }
}
