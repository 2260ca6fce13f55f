//! Bridge wire messages.
//!
//! One JSON object per WebSocket text frame. Control messages carry a `type`
//! tag; request and response frames are recognized by the presence of
//! `method` respectively `result`/`error`. `peer_id` round-trips unchanged so
//! the hub can route a response back to the peer that originated the request.

use serde::{Deserialize, Serialize};

use gitnexus_core::{CodebaseContext, GatewayError};

/// Any frame the bridge sends or receives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BridgeMessage {
    Control(ControlMessage),
    Request(RequestFrame),
    Response(ResponseFrame),
}

/// Type-tagged control messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// First frame a peer sends; the hub validates the token.
    Handshake { id: String, token: String },
    HandshakeAck {
        id: String,
    },
    HandshakeNack {
        id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Completes peer registration after a successful handshake.
    RegisterPeer { agent_name: String },
    /// Context push; sending one implicitly marks the sender as the browser.
    Context { params: CodebaseContext },
}

/// A tool call on its way to the browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestFrame {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    pub agent_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_id: Option<String>,
}

/// A tool result on its way back to the origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_id: Option<String>,
}

/// Error payload inside a response frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireError {
    pub code: String,
    pub message: String,
}

impl ResponseFrame {
    /// Synthesized error response, used by the hub when no browser is
    /// connected.
    pub fn browser_disconnected(id: String, peer_id: Option<String>) -> Self {
        let err = GatewayError::BrowserDisconnected;
        Self {
            id,
            result: None,
            error: Some(WireError {
                code: err.code().to_string(),
                message: err.to_string(),
            }),
            peer_id,
        }
    }

    /// Map the frame into the gateway result the pending table completes with.
    pub fn into_result(self) -> Result<serde_json::Value, GatewayError> {
        if let Some(error) = self.error {
            return Err(match error.code.as_str() {
                "BROWSER_DISCONNECTED" => GatewayError::BrowserDisconnected,
                _ => GatewayError::Internal {
                    message: format!("{}: {}", error.code, error.message),
                },
            });
        }
        Ok(self.result.unwrap_or(serde_json::Value::Null))
    }
}

impl BridgeMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_text(&self) -> String {
        serde_json::to_string(self).expect("bridge messages serialize")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn handshake_roundtrip() {
        let text = r#"{"type":"handshake","id":"h1","token":"secret"}"#;
        match BridgeMessage::parse(text).unwrap() {
            BridgeMessage::Control(ControlMessage::Handshake { id, token }) => {
                assert_eq!(id, "h1");
                assert_eq!(token, "secret");
            }
            other => panic!("misparsed: {other:?}"),
        }
    }

    #[test]
    fn request_is_recognized_by_method() {
        let frame = BridgeMessage::Request(RequestFrame {
            id: "r7".into(),
            method: "overview".into(),
            params: json!({"limit": 20}),
            agent_name: "claude-code".into(),
            peer_id: None,
        });
        let text = frame.to_text();
        assert!(!text.contains("\"type\""));
        assert!(!text.contains("peer_id"));
        match BridgeMessage::parse(&text).unwrap() {
            BridgeMessage::Request(req) => assert_eq!(req.method, "overview"),
            other => panic!("misparsed: {other:?}"),
        }
    }

    #[test]
    fn response_routes_by_peer_id() {
        let text = r#"{"id":"r7","peer_id":"P","result":{"ok":true}}"#;
        match BridgeMessage::parse(text).unwrap() {
            BridgeMessage::Response(resp) => {
                assert_eq!(resp.peer_id.as_deref(), Some("P"));
                assert_eq!(resp.into_result().unwrap(), json!({"ok": true}));
            }
            other => panic!("misparsed: {other:?}"),
        }
    }

    #[test]
    fn error_response_maps_to_gateway_error() {
        let resp = ResponseFrame::browser_disconnected("r1".into(), Some("P".into()));
        let err = resp.into_result().unwrap_err();
        assert_eq!(err.code(), "BROWSER_DISCONNECTED");
    }

    #[test]
    fn context_push_parses_snapshot() {
        let text = json!({
            "type": "context",
            "params": {
                "project_name": "acme",
                "stats": {"file_count": 1, "function_count": 2,
                          "class_count": 0, "interface_count": 0, "method_count": 0},
                "hotspots": [],
                "folder_tree": "src/"
            }
        })
        .to_string();
        match BridgeMessage::parse(&text).unwrap() {
            BridgeMessage::Control(ControlMessage::Context { params }) => {
                assert_eq!(params.project_name, "acme");
            }
            other => panic!("misparsed: {other:?}"),
        }
    }
}
