// ABOUTME: Implements the Registry - a thread-safe, in-memory ToolRegistry
// ABOUTME: for discovering and managing available tools at runtime.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{Tool, ToolHandle, ToolRegistry, ToolSet};

/// A thread-safe registry of tools.
///
/// Clones share state. Lookups return snapshots, so tools registered or
/// removed later only affect runs dispatched afterwards.
#[derive(Default)]
pub struct Registry {
    tools: Arc<RwLock<HashMap<String, ToolHandle>>>,
}

impl Registry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool.
    pub fn register<T: Tool + 'static>(&self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    /// Register a tool from an Arc.
    pub fn register_arc(&self, tool: ToolHandle) {
        self.tools.write().insert(tool.name().to_string(), tool);
    }

    /// Unregister a tool by name.
    pub fn unregister(&self, name: &str) {
        self.tools.write().remove(name);
    }

    /// List all tool names, sorted alphabetically.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.tools.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Get the number of registered tools.
    pub fn count(&self) -> usize {
        self.tools.read().len()
    }
}

impl ToolRegistry for Registry {
    fn list(&self) -> ToolSet {
        self.tools.read().values().cloned().collect()
    }

    fn lookup(&self, name: &str) -> Option<ToolHandle> {
        self.tools.read().get(name).cloned()
    }
}

impl Clone for Registry {
    fn clone(&self) -> Self {
        Self {
            tools: Arc::clone(&self.tools),
        }
    }
}
