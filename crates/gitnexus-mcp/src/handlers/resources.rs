//! MCP resource handlers: liveness and the context snapshot.

use chrono::Utc;
use serde_json::json;
use tracing::debug;

use crate::protocol::{error_codes, RequestId, RpcResponse};

use super::Handlers;

/// Liveness resource, always listed.
pub const HEALTH_URI: &str = "gitnexus://codebase/health";

/// Context snapshot resource, listed only while a snapshot is cached.
pub const CONTEXT_URI: &str = "gitnexus://codebase/context";

const NO_CONTEXT_MESSAGE: &str =
    "No codebase context yet. Open the GitNexus app in your browser and load a repository \
     so it can push its index to this gateway.";

impl Handlers {
    /// Handle resources/list.
    pub(crate) fn handle_resources_list(&self, id: Option<RequestId>) -> RpcResponse {
        debug!("handling resources/list request");

        let mut resources = vec![json!({
            "uri": HEALTH_URI,
            "name": "Gateway health",
            "description": "Connection state of the gateway and its browser backend",
            "mimeType": "application/json"
        })];

        if self.bridge().context().is_some() {
            resources.push(json!({
                "uri": CONTEXT_URI,
                "name": "Codebase context",
                "description": "Latest project snapshot pushed by the browser",
                "mimeType": "text/markdown"
            }));
        }

        RpcResponse::ok(id, json!({ "resources": resources }))
    }

    /// Handle resources/read.
    pub(crate) fn handle_resources_read(
        &self,
        id: Option<RequestId>,
        params: Option<serde_json::Value>,
    ) -> RpcResponse {
        let uri = match params
            .as_ref()
            .and_then(|p| p.get("uri"))
            .and_then(|u| u.as_str())
        {
            Some(uri) => uri.to_string(),
            None => {
                return RpcResponse::fail(
                    id,
                    error_codes::INVALID_PARAMS,
                    "Missing 'uri' parameter in resources/read",
                );
            }
        };

        match uri.as_str() {
            HEALTH_URI => {
                let health = self.health_document();
                RpcResponse::ok(
                    id,
                    json!({
                        "contents": [{
                            "uri": HEALTH_URI,
                            "mimeType": "application/json",
                            "text": serde_json::to_string(&health)
                                .unwrap_or_else(|_| "{}".to_string())
                        }]
                    }),
                )
            }
            CONTEXT_URI => {
                let text = match self.bridge().context() {
                    Some(context) => context.render_markdown(),
                    None => NO_CONTEXT_MESSAGE.to_string(),
                };
                RpcResponse::ok(
                    id,
                    json!({
                        "contents": [{
                            "uri": CONTEXT_URI,
                            "mimeType": "text/markdown",
                            "text": text
                        }]
                    }),
                )
            }
            other => RpcResponse::fail(
                id,
                error_codes::RESOURCE_NOT_FOUND,
                format!("Unknown resource: {other}"),
            ),
        }
    }

    /// Assemble the health JSON.
    ///
    /// `status` folds connection and snapshot state into one word:
    /// `disconnected` (no backend), `no_context` (backend but no snapshot),
    /// `healthy` (both).
    fn health_document(&self) -> serde_json::Value {
        let connected = self.bridge().connected();
        let context = self.bridge().context();

        let status = if !connected {
            "disconnected"
        } else if context.is_none() {
            "no_context"
        } else {
            "healthy"
        };

        let mut health = json!({
            "status": status,
            "timestamp": Utc::now().to_rfc3339(),
            "connection": {
                "browser": connected,
                "mode": self.bridge().mode().as_str()
            }
        });
        if let Some(context) = context {
            health["context"] = json!({
                "project": context.project_name,
                "files": context.stats.file_count,
                "functions": context.stats.function_count
            });
        }
        health
    }
}
