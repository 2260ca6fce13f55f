//! Gateway configuration, loaded from the environment.
//!
//! Everything is overridable through `GITNEXUS_*` variables; defaults match
//! the documented contract. The CLI applies its `--port` flag on top of the
//! loaded value.

use std::env;
use std::time::Duration;

use rand::RngCore;

/// Default hub/peer WebSocket port.
pub const DEFAULT_PORT: u16 = 54319;

/// Default deadline for quick-category tools.
pub const DEFAULT_QUICK_TIMEOUT_MS: u64 = 60_000;

/// Default deadline for heavy-category tools.
pub const DEFAULT_HEAVY_TIMEOUT_MS: u64 = 120_000;

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Localhost port the bridge binds or joins.
    pub port: u16,
    /// Preshared bridge auth token.
    pub token: String,
    /// True when the token was generated for this run rather than preshared.
    pub token_is_generated: bool,
    /// Agent name tagged onto logs and forwarded requests.
    pub agent_name: String,
    /// Deadline for quick-category tools.
    pub quick_timeout: Duration,
    /// Deadline for heavy-category tools.
    pub heavy_timeout: Duration,
    /// When true, error envelopes carry diagnostic `details`.
    pub debug: bool,
}

impl Config {
    /// Load configuration from the environment.
    pub fn from_env() -> Self {
        let port = env::var("GITNEXUS_PORT")
            .ok()
            .and_then(|v| v.trim().parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        let (token, token_is_generated) = resolve_token();

        let quick_timeout = env::var("GITNEXUS_TIMEOUT_QUICK")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(DEFAULT_QUICK_TIMEOUT_MS));

        let heavy_timeout = env::var("GITNEXUS_TIMEOUT_HEAVY")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(DEFAULT_HEAVY_TIMEOUT_MS));

        let debug = env::var("GITNEXUS_DEBUG")
            .map(|v| {
                matches!(
                    v.trim().to_ascii_lowercase().as_str(),
                    "1" | "true" | "yes" | "on"
                )
            })
            .unwrap_or(false);

        Self {
            port,
            token,
            token_is_generated,
            agent_name: detect_agent_name(),
            quick_timeout,
            heavy_timeout,
            debug,
        }
    }
}

/// Resolve the bridge auth token.
///
/// Returns `(token, is_generated)`. A generated token is 24 random bytes,
/// hex-encoded; the caller is responsible for logging it once so the browser
/// operator can copy it.
fn resolve_token() -> (String, bool) {
    if let Ok(value) = env::var("GITNEXUS_TOKEN") {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return (trimmed.to_string(), false);
        }
    }

    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    let token = bytes.iter().fold(String::with_capacity(48), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    });
    (token, true)
}

/// Determine the agent name for log tagging and request attribution.
///
/// `GITNEXUS_AGENT` wins; otherwise well-known indicators left in the
/// environment by the parent process are checked; otherwise `"unknown"`.
pub fn detect_agent_name() -> String {
    if let Ok(name) = env::var("GITNEXUS_AGENT") {
        let trimmed = name.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    if env::var("CLAUDECODE").is_ok() || env::var("CLAUDE_CODE_ENTRYPOINT").is_ok() {
        return "claude-code".to_string();
    }
    if env::var("CURSOR_TRACE_ID").is_ok() {
        return "cursor".to_string();
    }
    if env::var("WINDSURF").is_ok() {
        return "windsurf".to_string();
    }
    if env::var("VSCODE_PID").is_ok()
        || env::var("TERM_PROGRAM").map(|v| v == "vscode").unwrap_or(false)
    {
        return "vscode".to_string();
    }

    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_token_is_48_hex_chars() {
        let (token, generated) = resolve_token();
        if generated {
            assert_eq!(token.len(), 48);
            assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn defaults_match_contract() {
        // Only assert the constants; from_env() reads process-global state
        // that other tests may have set.
        assert_eq!(DEFAULT_PORT, 54319);
        assert_eq!(DEFAULT_QUICK_TIMEOUT_MS, 60_000);
        assert_eq!(DEFAULT_HEAVY_TIMEOUT_MS, 120_000);
    }
}
