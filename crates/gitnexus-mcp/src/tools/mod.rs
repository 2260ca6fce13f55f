//! MCP tool definitions for the gateway's fixed catalogue.
//!
//! This module defines the 15 read-only tools exposed through `tools/list`
//! and `tools/call`.
//!
//! # Module Structure
//!
//! - `names`: Tool name constants for dispatch matching
//! - `registry`: Centralized tool registry with O(1) lookup
//! - `definitions`: Tool definitions organized by category
//!   - `query`: Direct graph/file queries (context, search, cypher, grep, read, explore, overview)
//!   - `analysis`: Analysis and composite tools (impact, highlight, diff, deep_dive,
//!     review_file, trace_flow, find_similar, test_impact)

pub mod definitions;
pub mod names;
pub mod registry;

pub use self::registry::{register_all_tools, ToolRegistry};

use serde::{Deserialize, Serialize};

/// Deadline category for a tool.
///
/// Quick tools answer from the in-memory graph; heavy tools run open-ended
/// traversals or free-form queries and get the longer deadline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    #[default]
    Quick,
    Heavy,
}

/// MCP tool definition following the protocol specification.
///
/// Each tool has a name, description, and JSON Schema for input validation.
/// The `category` drives the per-call deadline and is not part of the wire
/// representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name
    pub name: String,

    /// Human-readable description of what the tool does
    pub description: String,

    /// JSON Schema defining the tool's input parameters
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,

    /// Deadline category; internal, never serialized to the agent
    #[serde(skip)]
    pub category: ToolCategory,
}

impl ToolDefinition {
    /// Create a new quick-category tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            category: ToolCategory::Quick,
        }
    }

    /// Mark this tool heavy (longer deadline).
    pub fn heavy(mut self) -> Self {
        self.category = ToolCategory::Heavy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::definitions::get_tool_definitions;

    #[test]
    fn test_get_tool_definitions() {
        let tools = get_tool_definitions();
        assert_eq!(tools.len(), 15);

        let tool_names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        for name in names::ALL {
            assert!(tool_names.contains(&name), "missing tool: {name}");
        }
    }

    #[test]
    fn test_tool_definition_serialization() {
        let tools = get_tool_definitions();
        let json = serde_json::to_string(&tools).unwrap();
        assert!(json.contains("cypher"));
        assert!(json.contains("inputSchema"));
        // category is an internal field
        assert!(!json.contains("\"category\""));
    }

    #[test]
    fn test_categories_match_contract() {
        let tools = get_tool_definitions();
        let category_of = |name: &str| {
            tools
                .iter()
                .find(|t| t.name == name)
                .unwrap_or_else(|| panic!("missing tool: {name}"))
                .category
        };

        for heavy in [names::CYPHER, names::IMPACT, names::EXPLORE] {
            assert_eq!(category_of(heavy), ToolCategory::Heavy, "{heavy} must be heavy");
        }
        for quick in [
            names::CONTEXT,
            names::SEARCH,
            names::GREP,
            names::READ,
            names::OVERVIEW,
            names::HIGHLIGHT,
            names::DIFF,
            names::DEEP_DIVE,
            names::REVIEW_FILE,
            names::TRACE_FLOW,
            names::FIND_SIMILAR,
            names::TEST_IMPACT,
        ] {
            assert_eq!(category_of(quick), ToolCategory::Quick, "{quick} must be quick");
        }
    }

    #[test]
    fn test_search_schema_constraints() {
        let tools = get_tool_definitions();
        let search = tools.iter().find(|t| t.name == "search").unwrap();

        let schema = &search.input_schema;
        let required = schema.get("required").unwrap().as_array().unwrap();
        assert!(required.iter().any(|v| v.as_str() == Some("query")));
        assert_eq!(schema["properties"]["limit"]["maximum"], 100);
        assert_eq!(schema["properties"]["limit"]["default"], 10);
    }
}
