//! Read-only firewall for the `cypher` tool.
//!
//! The graph query tool is the only free-form input the gateway forwards, so
//! it gets its own enforcement layer: length limits, an anchor-clause
//! allow-set, a write-keyword deny-set, and a multi-statement guard. Rules
//! run in order; the first violation wins.
//!
//! Firewall rejections happen before any backend interaction and are never
//! counted against the circuit breaker.

use std::sync::OnceLock;

use regex::Regex;

use gitnexus_core::GatewayError;

/// Longest accepted query, in characters.
pub const MAX_QUERY_LEN: usize = 10_000;

/// Shortest accepted query, in characters ("MATCH" plus one).
pub const MIN_QUERY_LEN: usize = 6;

/// Clauses a query may start with.
const ALLOWED_STARTS: [&str; 5] = ["MATCH", "RETURN", "WITH", "OPTIONAL", "UNWIND"];

/// Keywords that make a query a write (or admin) statement.
const FORBIDDEN_KEYWORDS: [&str; 25] = [
    "CREATE", "MERGE", "DELETE", "DETACH", "DROP", "SET", "REMOVE", "CALL", "LOAD", "CSV",
    "FOREACH", "USING", "INDEX", "CONSTRAINT", "DATABASE", "USER", "ROLE", "GRANT", "REVOKE",
    "DENY", "SHOW", "START", "STOP", "ALTER", "RENAME",
];

fn deny_regex() -> &'static Regex {
    static DENY: OnceLock<Regex> = OnceLock::new();
    DENY.get_or_init(|| {
        let alternation = FORBIDDEN_KEYWORDS.join("|");
        Regex::new(&format!(r"(?i)\b({alternation})\b")).expect("deny-set regex compiles")
    })
}

/// Check a cypher query against the read-only rules.
///
/// On acceptance returns the trimmed query, which replaces the original
/// argument before dispatch.
pub fn check(query: &str) -> Result<String, GatewayError> {
    let trimmed = query.trim();

    if trimmed.is_empty() {
        return Err(forbidden("query is empty", None));
    }
    let char_count = trimmed.chars().count();
    if char_count < MIN_QUERY_LEN {
        return Err(forbidden(
            &format!("query is shorter than {MIN_QUERY_LEN} characters"),
            None,
        ));
    }
    if char_count > MAX_QUERY_LEN {
        return Err(forbidden(
            &format!("query exceeds {MAX_QUERY_LEN} characters"),
            None,
        ));
    }

    let first_token = trimmed
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    if !ALLOWED_STARTS.contains(&first_token.as_str()) {
        return Err(forbidden(
            &format!(
                "query must start with one of {}, got '{first_token}'",
                ALLOWED_STARTS.join(", ")
            ),
            None,
        ));
    }

    if let Some(captures) = deny_regex().captures(trimmed) {
        let keyword = captures[1].to_ascii_uppercase();
        return Err(forbidden(
            &format!("forbidden keyword '{keyword}'"),
            Some(keyword),
        ));
    }

    if has_semicolon_outside_quotes(trimmed) {
        return Err(forbidden("multiple statements are not allowed", None));
    }

    Ok(trimmed.to_string())
}

fn forbidden(reason: &str, keyword: Option<String>) -> GatewayError {
    GatewayError::CypherForbidden {
        reason: reason.to_string(),
        keyword,
    }
}

/// Scan for a `;` outside single- or double-quoted string literals.
fn has_semicolon_outside_quotes(query: &str) -> bool {
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;

    for ch in query.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_single || in_double => escaped = true,
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            ';' if !in_single && !in_double => return true,
            _ => {}
        }
    }
    false
}
