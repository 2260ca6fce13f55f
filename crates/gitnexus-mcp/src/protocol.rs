//! JSON-RPC 2.0 frame types for the MCP surface.
//!
//! Only the handful of shapes this server actually speaks: a request frame,
//! a response frame, and the id/error members they share. Responses are
//! built through [`RpcResponse::ok`] / [`RpcResponse::fail`] so the
//! `jsonrpc` marker and the result/error exclusivity can't drift.

use serde::{Deserialize, Serialize};

/// Request identifier, echoed back verbatim on the response.
///
/// Clients may send either JSON form; notifications carry none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Num(i64),
    Str(String),
}

/// One decoded request frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl RpcRequest {
    /// A frame without an id expects no response.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Error member of a failed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// One response frame; exactly one of `result`/`error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
}

impl RpcResponse {
    /// Successful response carrying `result`.
    pub fn ok(id: Option<RequestId>, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Failed response carrying an error object.
    pub fn fail(id: Option<RequestId>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(RpcErrorObject {
                code,
                message: message.into(),
                data: None,
            }),
            id,
        }
    }

    /// Marker response for notifications: nothing gets written to stdout.
    pub fn none() -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: None,
            error: None,
            id: None,
        }
    }

    /// True when this is the notification marker from [`Self::none`].
    pub fn is_none_marker(&self) -> bool {
        self.id.is_none() && self.result.is_none() && self.error.is_none()
    }
}

/// Standard JSON-RPC error codes.
pub mod error_codes {
    // Standard JSON-RPC 2.0 error codes
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    // Gateway-specific error codes (-32001 to -32099)
    pub const RESOURCE_NOT_FOUND: i32 = -32001;
    pub const PAYLOAD_TOO_LARGE: i32 = -32003;
    pub const SERVER_SHUTTING_DOWN: i32 = -32005;
}

/// MCP method names.
pub mod methods {
    // MCP lifecycle methods
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED_NOTIFICATION: &str = "notifications/initialized";
    pub const PING: &str = "ping";

    // MCP tools protocol methods
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";

    // MCP resources protocol methods
    pub const RESOURCES_LIST: &str = "resources/list";
    pub const RESOURCES_READ: &str = "resources/read";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_request_with_numeric_id() {
        let frame = r#"{"jsonrpc":"2.0","method":"tools/list","id":42}"#;
        let request: RpcRequest = serde_json::from_str(frame).unwrap();
        assert_eq!(request.method, "tools/list");
        assert_eq!(request.id, Some(RequestId::Num(42)));
        assert!(request.params.is_none());
        assert!(!request.is_notification());
    }

    #[test]
    fn decodes_notification_without_id() {
        let frame = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        let request: RpcRequest = serde_json::from_str(frame).unwrap();
        assert!(request.is_notification());
    }

    #[test]
    fn string_ids_survive_the_round_trip() {
        let response = RpcResponse::ok(Some(RequestId::Str("call-9".into())), json!({"tools": []}));
        let encoded = serde_json::to_string(&response).unwrap();
        assert!(encoded.contains(r#""id":"call-9""#));
        assert!(!encoded.contains("error"));
    }

    #[test]
    fn ok_and_fail_are_mutually_exclusive() {
        let good = RpcResponse::ok(Some(RequestId::Num(3)), json!(true));
        assert!(good.result.is_some() && good.error.is_none());

        let bad = RpcResponse::fail(
            Some(RequestId::Num(3)),
            error_codes::METHOD_NOT_FOUND,
            "no such method",
        );
        assert!(bad.result.is_none());
        assert_eq!(bad.error.unwrap().code, error_codes::METHOD_NOT_FOUND);
    }

    #[test]
    fn notification_marker_is_detectable() {
        assert!(RpcResponse::none().is_none_marker());
        assert!(!RpcResponse::ok(None, json!(null)).is_none_marker());
        assert!(!RpcResponse::fail(None, error_codes::PARSE_ERROR, "bad frame").is_none_marker());
    }
}
