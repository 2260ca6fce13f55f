//! Codebase context snapshot pushed by the browser.
//!
//! The snapshot is latest-only: the browser is the single writer, every
//! connected daemon is a reader, and a new push replaces the previous value
//! wholesale.

use serde::{Deserialize, Serialize};

/// Aggregate counts for the indexed codebase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodebaseStats {
    #[serde(default)]
    pub file_count: u64,
    #[serde(default)]
    pub function_count: u64,
    #[serde(default)]
    pub class_count: u64,
    #[serde(default)]
    pub interface_count: u64,
    #[serde(default)]
    pub method_count: u64,
}

/// A highly-connected node surfaced by the browser's analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub file_path: String,
    #[serde(default)]
    pub connections: u64,
}

/// Latest-only snapshot of the indexed project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodebaseContext {
    pub project_name: String,
    #[serde(default)]
    pub stats: CodebaseStats,
    #[serde(default)]
    pub hotspots: Vec<Hotspot>,
    #[serde(default)]
    pub folder_tree: String,
}

/// Canned closing section of the context resource. The tool surface is fixed
/// per release, so this text is static.
const TOOLS_AND_SCHEMA: &str = "\
## Tools

15 read-only tools are exposed over MCP: `context`, `search`, `cypher`, \
`grep`, `read`, `explore`, `overview`, `impact`, `highlight`, `diff`, \
`deep_dive`, `review_file`, `trace_flow`, `find_similar`, `test_impact`. \
Call `tools/list` for input schemas.

## Graph Schema

Nodes: `File`, `Folder`, `Function`, `Class`, `Interface`, `Method`, \
`Cluster`, `Process`. Relationships: `CONTAINS`, `IMPORTS`, `CALLS`, \
`EXTENDS`, `IMPLEMENTS`, `MEMBER_OF`, `PART_OF`. Query them with the \
`cypher` tool (read-only clauses only).";

impl CodebaseContext {
    /// Deterministic markdown rendering of the snapshot.
    ///
    /// Same snapshot in, byte-identical document out; this is the body of the
    /// `gitnexus://codebase/context` resource.
    pub fn render_markdown(&self) -> String {
        let mut doc = String::with_capacity(1024);
        doc.push_str(&format!("# Codebase: {}\n\n", self.project_name));

        doc.push_str("## Statistics\n\n");
        doc.push_str(&format!("- Files: {}\n", self.stats.file_count));
        doc.push_str(&format!("- Functions: {}\n", self.stats.function_count));
        doc.push_str(&format!("- Classes: {}\n", self.stats.class_count));
        doc.push_str(&format!("- Interfaces: {}\n", self.stats.interface_count));
        doc.push_str(&format!("- Methods: {}\n\n", self.stats.method_count));

        doc.push_str("## Hotspots\n\n");
        if self.hotspots.is_empty() {
            doc.push_str("- none\n\n");
        } else {
            for hotspot in &self.hotspots {
                doc.push_str(&format!(
                    "- {} ({}) — {} connections — {}\n",
                    hotspot.name, hotspot.kind, hotspot.connections, hotspot.file_path
                ));
            }
            doc.push('\n');
        }

        doc.push_str("## Project Structure\n\n");
        doc.push_str("```\n");
        doc.push_str(&self.folder_tree);
        if !self.folder_tree.ends_with('\n') {
            doc.push('\n');
        }
        doc.push_str("```\n\n");

        doc.push_str(TOOLS_AND_SCHEMA);
        doc.push('\n');
        doc
    }
}
