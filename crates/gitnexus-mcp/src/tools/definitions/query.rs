//! Query tool definitions: direct graph and file lookups.
//!
//! Tools: context, search, cypher, grep, read, explore, overview

use serde_json::json;

use crate::tools::ToolDefinition;

/// Returns the query tool definitions (7 tools).
pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        // context - orientation call, usually the agent's first
        ToolDefinition::new(
            "context",
            "Get the indexed project's overview: statistics, top hotspots, folder tree, \
             the tool list and the graph schema. Call this first to orient yourself.",
            json!({
                "type": "object",
                "properties": {},
                "required": [],
                "additionalProperties": false
            }),
        ),
        // search - hybrid keyword + semantic
        ToolDefinition::new(
            "search",
            "Hybrid keyword and semantic search over the code graph. \
             Returns ranked symbols with their files, optionally grouped by process.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "minLength": 1,
                        "description": "What to search for (identifier, concept, or phrase)"
                    },
                    "limit": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 100,
                        "default": 10,
                        "description": "Maximum number of results to return"
                    },
                    "group_by_process": {
                        "type": "boolean",
                        "default": true,
                        "description": "Group results by the business process they belong to"
                    }
                },
                "required": ["query"],
                "additionalProperties": false
            }),
        ),
        // cypher - free-form read-only graph query (firewalled)
        ToolDefinition::new(
            "cypher",
            "Run a read-only Cypher query against the code graph. Only MATCH, RETURN, WITH, \
             OPTIONAL and UNWIND clauses are accepted; write keywords are rejected.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "minLength": 1,
                        "description": "The Cypher query to execute (read-only)"
                    }
                },
                "required": ["query"],
                "additionalProperties": false
            }),
        )
        .heavy(),
        // grep - regex over file contents
        ToolDefinition::new(
            "grep",
            "Regex search over indexed file contents. Returns matching lines with file and \
             line number.",
            json!({
                "type": "object",
                "properties": {
                    "pattern": {
                        "type": "string",
                        "minLength": 1,
                        "description": "Regular expression to match"
                    },
                    "case_sensitive": {
                        "type": "boolean",
                        "default": false,
                        "description": "Match case-sensitively"
                    },
                    "max_results": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 500,
                        "default": 50,
                        "description": "Maximum number of matching lines to return"
                    }
                },
                "required": ["pattern"],
                "additionalProperties": false
            }),
        ),
        // read - file contents, optionally a line range
        ToolDefinition::new(
            "read",
            "Read an indexed file's contents, optionally restricted to a line range.",
            json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "minLength": 1,
                        "description": "Path of the file, as indexed"
                    },
                    "start_line": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "First line to return (1-based)"
                    },
                    "end_line": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Last line to return; must be >= start_line when both are given"
                    }
                },
                "required": ["file_path"],
                "additionalProperties": false
            }),
        ),
        // explore - expand one named entity
        ToolDefinition::new(
            "explore",
            "Explore a named symbol, cluster or process: definition, members, and \
             incoming/outgoing relationships.",
            json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "minLength": 1,
                        "description": "Name of the entity to explore"
                    },
                    "type": {
                        "type": "string",
                        "enum": ["symbol", "cluster", "process"],
                        "description": "What kind of entity the name refers to"
                    }
                },
                "required": ["name", "type"],
                "additionalProperties": false
            }),
        )
        .heavy(),
        // overview - architecture summary
        ToolDefinition::new(
            "overview",
            "Architecture overview: top-level clusters and business processes with their sizes.",
            json!({
                "type": "object",
                "properties": {
                    "show_processes": {
                        "type": "boolean",
                        "default": true,
                        "description": "Include business processes"
                    },
                    "show_clusters": {
                        "type": "boolean",
                        "default": true,
                        "description": "Include structural clusters"
                    },
                    "limit": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 100,
                        "default": 20,
                        "description": "Maximum entries per section"
                    }
                },
                "required": [],
                "additionalProperties": false
            }),
        ),
    ]
}
