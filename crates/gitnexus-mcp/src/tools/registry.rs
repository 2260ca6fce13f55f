//! Tool registry for centralized tool management.
//!
//! Provides O(1) lookup by name and verifies the fixed catalogue at startup.
//! The registry is immutable once built; the tool surface changes only with
//! a release.

use std::collections::HashMap;

use super::names;
use super::ToolDefinition;

/// Registry holding all gateway tool definitions.
pub struct ToolRegistry {
    tools: HashMap<String, ToolDefinition>,
}

impl ToolRegistry {
    /// Create empty registry with capacity for the full catalogue.
    pub fn new() -> Self {
        Self {
            tools: HashMap::with_capacity(names::ALL.len()),
        }
    }

    /// Register a tool definition.
    ///
    /// # Panics
    ///
    /// Panics if a tool with the same name is already registered; a duplicate
    /// indicates a bug in the definitions modules.
    pub fn register(&mut self, tool: ToolDefinition) {
        let name = tool.name.clone();
        if self.tools.contains_key(&name) {
            panic!(
                "Duplicate tool registration: '{}'. Each tool name must be unique.",
                name
            );
        }
        self.tools.insert(name, tool);
    }

    /// Get a tool definition by name.
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    /// List all registered tools in catalogue order.
    ///
    /// Fixed ordering keeps `tools/list` responses identical across calls.
    pub fn list(&self) -> Vec<&ToolDefinition> {
        names::ALL
            .iter()
            .filter_map(|name| self.tools.get(*name))
            .collect()
    }

    /// Get count of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Check if a tool exists by name.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Register the full 15-tool catalogue.
///
/// # Panics
///
/// Panics if any name is registered twice or the total is not exactly 15
/// (indicates missing or extra tools in the definitions modules).
pub fn register_all_tools() -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    for tool in super::definitions::get_tool_definitions() {
        registry.register(tool);
    }

    let actual_count = registry.len();
    assert_eq!(
        actual_count, 15,
        "Expected 15 tools, got {}. Check definitions modules for missing/extra tools.",
        actual_count
    );

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registry_new_empty() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_register_all_tools_returns_15() {
        let registry = register_all_tools();
        assert_eq!(registry.len(), 15);
        for name in names::ALL {
            assert!(registry.contains(name), "missing tool: {name}");
        }
    }

    #[test]
    #[should_panic(expected = "Duplicate tool registration")]
    fn test_duplicate_registration_panics() {
        let mut registry = ToolRegistry::new();
        let tool = ToolDefinition::new("test_tool", "Test", json!({"type": "object"}));
        registry.register(tool.clone());
        registry.register(tool); // Should panic
    }

    #[test]
    fn test_get_unknown_tool_returns_none() {
        let registry = register_all_tools();
        assert!(registry.get("nonexistent_tool").is_none());
        assert!(registry.get("").is_none());
        assert!(registry.get("SEARCH").is_none()); // case sensitive
    }

    #[test]
    fn test_list_is_stable_catalogue_order() {
        let registry = register_all_tools();
        let first: Vec<_> = registry.list().iter().map(|t| t.name.clone()).collect();
        let second: Vec<_> = registry.list().iter().map(|t| t.name.clone()).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 15);
        assert_eq!(first[0], names::CONTEXT);
    }
}
