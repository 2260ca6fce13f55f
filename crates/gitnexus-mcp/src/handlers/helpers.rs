//! MCP tool result helpers.

use serde_json::json;

use gitnexus_core::GatewayError;

use crate::protocol::{RequestId, RpcResponse};

use super::Handlers;

impl Handlers {
    /// MCP-compliant tool result helper.
    ///
    /// Wraps tool output in the required MCP format:
    /// ```json
    /// {
    ///   "content": [{"type": "text", "text": "..."}],
    ///   "isError": false
    /// }
    /// ```
    pub(crate) fn tool_result(
        &self,
        id: Option<RequestId>,
        data: serde_json::Value,
    ) -> RpcResponse {
        RpcResponse::ok(
            id,
            json!({
                "content": [{
                    "type": "text",
                    "text": serde_json::to_string(&data).unwrap_or_else(|_| "{}".to_string())
                }],
                "isError": false
            }),
        )
    }

    /// MCP-compliant tool error helper.
    ///
    /// The agent always receives the structured envelope as JSON text content
    /// with `isError` set; the JSON-RPC layer still reports success so the
    /// error reaches the model rather than the client runtime.
    pub(crate) fn tool_error(&self, id: Option<RequestId>, error: &GatewayError) -> RpcResponse {
        let envelope = error.to_envelope(self.config().debug);
        RpcResponse::ok(
            id,
            json!({
                "content": [{
                    "type": "text",
                    "text": serde_json::to_string(&envelope)
                        .unwrap_or_else(|_| "{\"error\":true}".to_string())
                }],
                "isError": true
            }),
        )
    }
}
