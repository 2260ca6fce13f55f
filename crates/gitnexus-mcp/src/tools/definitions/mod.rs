//! Tool definitions organized by category.

pub mod analysis;
pub mod query;

use super::ToolDefinition;

/// Get all tool definitions for the `tools/list` response, in catalogue order.
pub fn get_tool_definitions() -> Vec<ToolDefinition> {
    let mut tools = query::definitions();
    tools.extend(analysis::definitions());
    tools
}
