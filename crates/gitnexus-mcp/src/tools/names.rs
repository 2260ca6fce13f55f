//! Tool names as constants for dispatch matching.
//!
//! Names are unprefixed at the MCP surface; the validator addresses tools
//! with the namespaced key from [`namespaced`].

// ========== QUERY TOOLS ==========

pub const CONTEXT: &str = "context";
pub const SEARCH: &str = "search";
/// Free-form read-only graph query, subject to the firewall.
pub const CYPHER: &str = "cypher";
pub const GREP: &str = "grep";
pub const READ: &str = "read";
pub const EXPLORE: &str = "explore";
pub const OVERVIEW: &str = "overview";

// ========== ANALYSIS TOOLS ==========

pub const IMPACT: &str = "impact";
/// UI side-effect: highlights nodes in the browser canvas.
pub const HIGHLIGHT: &str = "highlight";
pub const DIFF: &str = "diff";

// ========== COMPOSITE TOOLS ==========

pub const DEEP_DIVE: &str = "deep_dive";
pub const REVIEW_FILE: &str = "review_file";
pub const TRACE_FLOW: &str = "trace_flow";
pub const FIND_SIMILAR: &str = "find_similar";
pub const TEST_IMPACT: &str = "test_impact";

/// Every tool in the catalogue, in `tools/list` order.
pub const ALL: [&str; 15] = [
    CONTEXT,
    SEARCH,
    CYPHER,
    GREP,
    READ,
    EXPLORE,
    OVERVIEW,
    IMPACT,
    HIGHLIGHT,
    DIFF,
    DEEP_DIVE,
    REVIEW_FILE,
    TRACE_FLOW,
    FIND_SIMILAR,
    TEST_IMPACT,
];

/// Namespaced key used internally by the validator.
pub fn namespaced(name: &str) -> String {
    format!("gitnexus.{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_names_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for name in ALL {
            assert!(seen.insert(name), "duplicate tool name: {name}");
        }
    }

    #[test]
    fn namespaced_key_prefixes() {
        assert_eq!(namespaced(SEARCH), "gitnexus.search");
    }
}
