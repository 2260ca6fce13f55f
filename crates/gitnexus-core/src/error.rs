//! Error types for the GitNexus gateway.
//!
//! This module defines the central error type [`GatewayError`] used throughout
//! the gateway, along with the [`GatewayResult<T>`] type alias. Every variant
//! maps to exactly one wire error code, and every error the agent ever sees is
//! one of these, serialized through [`GatewayError::to_envelope`].

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// Result alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// A single validation failure, addressed by argument path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Path of the offending field, e.g. `query` or `changed_files[0]`.
    pub path: String,
    /// Human-plus-agent readable description of the failure.
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Top-level error type for gateway operations.
///
/// Each variant corresponds to one wire error code (see [`GatewayError::code`]).
/// The envelope the agent receives always carries `code`, `message`,
/// `suggestion` and `retryable`; `retry_after` and `details` appear per
/// variant.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Tool arguments failed schema validation.
    ///
    /// Raised before any backend interaction; never counted against the
    /// circuit breaker.
    #[error("Invalid arguments for tool '{tool}'")]
    Validation {
        /// Tool whose arguments were rejected
        tool: String,
        /// One entry per failed constraint
        issues: Vec<ValidationIssue>,
    },

    /// The cypher query violated the read-only firewall.
    #[error("Query rejected: {reason}")]
    CypherForbidden {
        /// Why the query was rejected
        reason: String,
        /// The deny-set keyword that matched, when one did
        keyword: Option<String>,
    },

    /// Named tool is not in the registry.
    #[error("Unknown tool: {name}")]
    ToolNotFound {
        /// The name the agent asked for
        name: String,
    },

    /// The backend did not answer within the tool-category deadline.
    #[error("Tool '{tool}' timed out after {elapsed_ms}ms")]
    Timeout {
        /// Tool that timed out
        tool: String,
        /// Deadline that elapsed, in milliseconds
        elapsed_ms: u64,
    },

    /// The circuit breaker is open; the backend is not being called.
    #[error("Circuit breaker open, retry in {retry_after}s")]
    CircuitOpen {
        /// Seconds until the breaker admits a probe
        retry_after: u64,
    },

    /// No browser is connected (directly or through the hub).
    #[error("Browser is not connected")]
    BrowserDisconnected,

    /// The peer's hub connection dropped mid-call.
    #[error("Connection to hub lost")]
    ConnectionLost,

    /// The peer reconnect loop gave up.
    #[error("Reconnect attempts exhausted after {attempts} tries")]
    RetryExhausted {
        /// How many reconnects were attempted
        attempts: u32,
    },

    /// The pending-request table is full.
    #[error("Too many in-flight requests ({pending})")]
    Overloaded {
        /// In-flight count at admission time
        pending: usize,
    },

    /// Catch-all for unexpected failures.
    #[error("Internal error: {message}")]
    Internal {
        /// What went wrong, shown in `details` only when debug is enabled
        message: String,
    },
}

impl GatewayError {
    /// Wire code for this error, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::CypherForbidden { .. } => "CYPHER_FORBIDDEN",
            Self::ToolNotFound { .. } => "TOOL_NOT_FOUND",
            Self::Timeout { .. } => "TIMEOUT",
            Self::CircuitOpen { .. } => "CIRCUIT_OPEN",
            Self::BrowserDisconnected => "BROWSER_DISCONNECTED",
            Self::ConnectionLost => "CONNECTION_LOST",
            Self::RetryExhausted { .. } => "RETRY_EXHAUSTED",
            Self::Overloaded { .. } => "OVERLOADED",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Whether the agent may retry the same call.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::CircuitOpen { .. }
                | Self::BrowserDisconnected
                | Self::ConnectionLost
                | Self::Overloaded { .. }
                | Self::Internal { .. }
        )
    }

    /// Seconds the agent should wait before retrying, when known.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::CircuitOpen { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Actionable hint for the agent, populated for every variant.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::Validation { .. } => {
                "Fix the listed arguments and call the tool again; check tools/list for the schema"
            }
            Self::CypherForbidden { .. } => {
                "Only read-only clauses are allowed: start with MATCH, RETURN, WITH, OPTIONAL or UNWIND \
                 and avoid write keywords"
            }
            Self::ToolNotFound { .. } => "Call tools/list for the set of available tools",
            Self::Timeout { .. } => {
                "Retry with a narrower query, or raise GITNEXUS_TIMEOUT_QUICK / GITNEXUS_TIMEOUT_HEAVY"
            }
            Self::CircuitOpen { .. } => "Wait retry_after seconds before retrying",
            Self::BrowserDisconnected => {
                "Open the GitNexus browser app so it can reconnect to the gateway"
            }
            Self::ConnectionLost => "The gateway is reconnecting to the hub; retry shortly",
            Self::RetryExhausted { .. } => {
                "Restart the daemon or check that the hub port is reachable"
            }
            Self::Overloaded { .. } => "Wait for in-flight calls to finish before issuing more",
            Self::Internal { .. } => "Retry once; if the error persists, restart the daemon",
        }
    }

    /// Structured diagnostics for the `details` field.
    ///
    /// `debug` gates internal messages so they never leak unless
    /// `GITNEXUS_DEBUG=true`.
    pub fn details(&self, debug: bool) -> Option<serde_json::Value> {
        match self {
            Self::Validation { issues, .. } => Some(json!({ "issues": issues })),
            Self::CypherForbidden { keyword, reason } => match keyword {
                Some(kw) => Some(json!({ "keyword": kw, "reason": reason })),
                None => Some(json!({ "reason": reason })),
            },
            Self::Timeout { elapsed_ms, .. } => Some(json!({ "elapsed_ms": elapsed_ms })),
            Self::Overloaded { pending } => Some(json!({ "pending": pending })),
            Self::RetryExhausted { attempts } => Some(json!({ "attempts": attempts })),
            Self::Internal { message } if debug => Some(json!({ "message": message })),
            _ => None,
        }
    }

    /// Serialize the error envelope the agent receives as tool text content.
    pub fn to_envelope(&self, debug: bool) -> serde_json::Value {
        let mut envelope = json!({
            "error": true,
            "code": self.code(),
            "message": self.to_string(),
            "suggestion": self.suggestion(),
            "retryable": self.retryable(),
        });
        let map = envelope.as_object_mut().expect("envelope is an object");
        if let Some(retry_after) = self.retry_after() {
            map.insert("retry_after".into(), json!(retry_after));
        }
        if let Some(details) = self.details(debug) {
            map.insert("details".into(), details);
        }
        envelope
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            GatewayError::Validation {
                tool: "search".into(),
                issues: vec![],
            }
            .code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(GatewayError::BrowserDisconnected.code(), "BROWSER_DISCONNECTED");
        assert_eq!(GatewayError::CircuitOpen { retry_after: 30 }.code(), "CIRCUIT_OPEN");
    }

    #[test]
    fn validation_is_not_retryable() {
        let err = GatewayError::Validation {
            tool: "search".into(),
            issues: vec![ValidationIssue::new("query", "query cannot be empty")],
        };
        assert!(!err.retryable());
        assert!(err.retry_after().is_none());
    }

    #[test]
    fn circuit_open_carries_retry_after() {
        let err = GatewayError::CircuitOpen { retry_after: 17 };
        let envelope = err.to_envelope(false);
        assert_eq!(envelope["code"], "CIRCUIT_OPEN");
        assert_eq!(envelope["retry_after"], 17);
        assert_eq!(envelope["retryable"], true);
    }

    #[test]
    fn internal_details_gated_by_debug() {
        let err = GatewayError::Internal {
            message: "stack trace".into(),
        };
        assert!(err.to_envelope(false).get("details").is_none());
        assert_eq!(err.to_envelope(true)["details"]["message"], "stack trace");
    }

    #[test]
    fn firewall_envelope_names_keyword() {
        let err = GatewayError::CypherForbidden {
            reason: "forbidden keyword".into(),
            keyword: Some("DELETE".into()),
        };
        let envelope = err.to_envelope(false);
        assert_eq!(envelope["details"]["keyword"], "DELETE");
        assert_eq!(envelope["retryable"], false);
    }
}
