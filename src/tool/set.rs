// ABOUTME: ToolSet - an immutable, name-ordered collection of tool handles.
// ABOUTME: Used for parent snapshots and for a child's effective capabilities.

use std::collections::BTreeMap;
use std::fmt;

use super::{ToolHandle, definition_of};
use crate::model::ToolDefinition;

/// An ordered set of tools keyed by name.
///
/// Cloning is cheap relative to the tools themselves: only the `Arc`
/// handles are copied, never the tools.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: BTreeMap<String, ToolHandle>,
}

impl ToolSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tool, replacing any tool with the same name.
    pub fn insert(&mut self, tool: ToolHandle) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Builder-style insert.
    pub fn with(mut self, tool: ToolHandle) -> Self {
        self.insert(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ToolHandle> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolHandle> {
        self.tools.values()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Keep only the tools for which `keep` returns true.
    pub fn filtered(&self, mut keep: impl FnMut(&str) -> bool) -> ToolSet {
        ToolSet {
            tools: self
                .tools
                .iter()
                .filter(|(name, _)| keep(name))
                .map(|(name, tool)| (name.clone(), tool.clone()))
                .collect(),
        }
    }

    /// Convert the set to model-facing tool definitions.
    pub fn to_definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| definition_of(t.as_ref()))
            .collect()
    }

    /// True when both sets hold the very same tool instances under the same names.
    pub fn same_tools(&self, other: &ToolSet) -> bool {
        self.tools.len() == other.tools.len()
            && self
                .tools
                .iter()
                .zip(other.tools.iter())
                .all(|((a_name, a), (b_name, b))| a_name == b_name && std::sync::Arc::ptr_eq(a, b))
    }
}

impl FromIterator<ToolHandle> for ToolSet {
    fn from_iter<I: IntoIterator<Item = ToolHandle>>(iter: I) -> Self {
        let mut set = ToolSet::new();
        for tool in iter {
            set.insert(tool);
        }
        set
    }
}

impl fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.tools.keys()).finish()
    }
}
