// ABOUTME: AgentRegistry - the frozen map of merged agent specs.
// ABOUTME: Resolves agent names and inline specs at invocation time.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::spec::{AgentMode, AgentSpec, Layer};
use crate::config::{self, ConfigLayer, PartialAgentSpec};
use crate::error::ConfigError;
use crate::tool::ToolRegistry;

/// How a caller names the agent to spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentRef {
    /// A registry entry.
    Named(String),

    /// Overrides applied on top of the registry entry with the same name,
    /// or on top of defaults if there is none.
    Inline {
        name: String,
        overrides: PartialAgentSpec,
    },
}

impl AgentRef {
    pub fn named(name: impl Into<String>) -> Self {
        AgentRef::Named(name.into())
    }

    pub fn inline(name: impl Into<String>, overrides: PartialAgentSpec) -> Self {
        AgentRef::Inline {
            name: name.into(),
            overrides,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            AgentRef::Named(name) | AgentRef::Inline { name, .. } => name,
        }
    }
}

impl From<&str> for AgentRef {
    fn from(name: &str) -> Self {
        AgentRef::named(name)
    }
}

/// Frozen registry of agent specs. Clones share the same specs.
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    specs: Arc<BTreeMap<String, Arc<AgentSpec>>>,
}

impl AgentRegistry {
    /// A registry holding only the built-in agents.
    pub fn builtin() -> Self {
        let layer = config::builtin_layer();
        let specs = layer
            .agents
            .iter()
            .map(|(name, partial)| {
                let spec = config::apply(AgentSpec::new(name.as_str()), partial, Layer::Builtin);
                (name.clone(), Arc::new(spec))
            })
            .collect();
        Self {
            specs: Arc::new(specs),
        }
    }

    /// Merge `layers` over the built-in defaults and validate against `tools`.
    pub fn build(layers: &[ConfigLayer], tools: &dyn ToolRegistry) -> Result<Self, ConfigError> {
        let mut all = Vec::with_capacity(layers.len() + 1);
        all.extend(layers.iter().cloned());
        all.push(config::builtin_layer());
        let specs = config::merge(&all, tools)?;
        Ok(Self {
            specs: Arc::new(specs),
        })
    }

    /// Get an agent spec by name.
    pub fn get(&self, name: &str) -> Option<Arc<AgentSpec>> {
        self.specs.get(name).cloned()
    }

    /// All agent names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.specs.keys().cloned().collect()
    }

    /// Agents usable in `mode`, sorted by name.
    pub fn agents_in_mode(&self, mode: AgentMode) -> Vec<Arc<AgentSpec>> {
        self.specs
            .values()
            .filter(|spec| spec.mode.usable_as(mode))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Resolve a caller's agent reference to a frozen spec.
    ///
    /// Returns `Ok(None)` for an unknown name. Inline overrides take
    /// precedence over the registry entry and are validated like any layer.
    pub fn resolve(
        &self,
        agent: &AgentRef,
        tools: &dyn ToolRegistry,
    ) -> Result<Option<Arc<AgentSpec>>, ConfigError> {
        match agent {
            AgentRef::Named(name) => Ok(self.get(name)),
            AgentRef::Inline { name, overrides } => {
                if !config::is_valid_agent_name(name) {
                    return Err(ConfigError::parse(
                        "inline",
                        Some(name),
                        "invalid agent name",
                    ));
                }
                let base = self
                    .get(name)
                    .map(|spec| spec.as_ref().clone())
                    .unwrap_or_else(|| AgentSpec::new(name.as_str()));
                let spec = config::apply(base, overrides, Layer::Inline);
                config::validate(&spec, tools)?;
                Ok(Some(Arc::new(spec)))
            }
        }
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
