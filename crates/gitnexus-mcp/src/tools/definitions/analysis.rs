//! Analysis and composite tool definitions.
//!
//! Tools: impact, highlight, diff, deep_dive, review_file, trace_flow,
//! find_similar, test_impact

use serde_json::json;

use crate::tools::ToolDefinition;

/// Returns the analysis tool definitions (8 tools).
pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        // impact - blast-radius analysis
        ToolDefinition::new(
            "impact",
            "Estimate the blast radius of changing a symbol: which callers (upstream) or \
             callees (downstream) are affected, with confidence scores.",
            json!({
                "type": "object",
                "properties": {
                    "target": {
                        "type": "string",
                        "minLength": 1,
                        "description": "Symbol whose change impact to analyze"
                    },
                    "direction": {
                        "type": "string",
                        "enum": ["upstream", "downstream"],
                        "description": "Follow callers (upstream) or callees (downstream)"
                    },
                    "max_depth": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 10,
                        "default": 3,
                        "description": "How many relationship hops to follow"
                    },
                    "relation_types": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Restrict traversal to these relationship types"
                    },
                    "include_tests": {
                        "type": "boolean",
                        "default": false,
                        "description": "Include test files in the result"
                    },
                    "min_confidence": {
                        "type": "number",
                        "minimum": 0,
                        "maximum": 1,
                        "default": 0.7,
                        "description": "Drop edges below this confidence"
                    }
                },
                "required": ["target", "direction"],
                "additionalProperties": false
            }),
        )
        .heavy(),
        // highlight - UI side-effect in the browser canvas
        ToolDefinition::new(
            "highlight",
            "Highlight nodes in the browser's graph canvas so the user can see what the \
             agent is talking about.",
            json!({
                "type": "object",
                "properties": {
                    "node_ids": {
                        "type": "array",
                        "items": { "type": "string" },
                        "minItems": 1,
                        "description": "Graph node ids to highlight"
                    },
                    "color": {
                        "type": "string",
                        "description": "Highlight color (CSS color string)"
                    }
                },
                "required": ["node_ids"],
                "additionalProperties": false
            }),
        ),
        // diff - changes since a baseline
        ToolDefinition::new(
            "diff",
            "List files changed since a baseline (by default the last index run), \
             optionally with content hunks.",
            json!({
                "type": "object",
                "properties": {
                    "baseline": {
                        "type": "string",
                        "default": "last_index",
                        "description": "Baseline ref to diff against"
                    },
                    "include_content": {
                        "type": "boolean",
                        "default": false,
                        "description": "Include content hunks, not just file names"
                    },
                    "filter": {
                        "type": "string",
                        "enum": ["all", "added", "modified", "deleted"],
                        "default": "all",
                        "description": "Restrict to one change kind"
                    }
                },
                "required": [],
                "additionalProperties": false
            }),
        ),
        // deep_dive - composite of explore + impact + read
        ToolDefinition::new(
            "deep_dive",
            "Full workup of one symbol: definition, relationships, impact and source. \
             Composite of explore, impact and read.",
            json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "minLength": 1,
                        "description": "Symbol to dive into"
                    }
                },
                "required": ["name"],
                "additionalProperties": false
            }),
        ),
        // review_file - composite per-file review
        ToolDefinition::new(
            "review_file",
            "Review one file: its symbols, their relationships, hotspots and recent changes.",
            json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "minLength": 1,
                        "description": "Path of the file to review"
                    }
                },
                "required": ["file_path"],
                "additionalProperties": false
            }),
        ),
        // trace_flow - call-path tracing
        ToolDefinition::new(
            "trace_flow",
            "Trace execution flow from one symbol, optionally until a target symbol is reached.",
            json!({
                "type": "object",
                "properties": {
                    "from": {
                        "type": "string",
                        "minLength": 1,
                        "description": "Symbol to start from"
                    },
                    "to": {
                        "type": "string",
                        "description": "Stop when this symbol is reached"
                    },
                    "max_steps": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 20,
                        "default": 10,
                        "description": "Maximum call steps to follow"
                    }
                },
                "required": ["from"],
                "additionalProperties": false
            }),
        ),
        // find_similar - structural similarity
        ToolDefinition::new(
            "find_similar",
            "Find symbols structurally and semantically similar to a named one.",
            json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "minLength": 1,
                        "description": "Symbol to find neighbours of"
                    },
                    "limit": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 20,
                        "default": 5,
                        "description": "Maximum number of similar symbols"
                    }
                },
                "required": ["name"],
                "additionalProperties": false
            }),
        ),
        // test_impact - which tests cover changed files
        ToolDefinition::new(
            "test_impact",
            "Given changed files, list the tests that cover them and optionally suggest \
             missing ones.",
            json!({
                "type": "object",
                "properties": {
                    "changed_files": {
                        "type": "array",
                        "items": { "type": "string" },
                        "minItems": 1,
                        "description": "Files that changed"
                    },
                    "max_depth": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 5,
                        "default": 2,
                        "description": "Dependency hops between a change and a test"
                    },
                    "suggest_tests": {
                        "type": "boolean",
                        "default": true,
                        "description": "Suggest tests for uncovered changes"
                    }
                },
                "required": ["changed_files"],
                "additionalProperties": false
            }),
        ),
    ]
}
