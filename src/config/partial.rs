// ABOUTME: Partial agent definitions as they appear in one configuration layer.
// ABOUTME: Parses runtime/project/user JSON documents with pinpointed errors.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::agent::{AgentMode, Budgets, Layer, ModelOverride, ToolPolicy};
use crate::error::ConfigError;
use crate::model::ModelHandle;

/// Model value that means "use the parent's model".
pub const INHERIT_MODEL: &str = "inherit";

static AGENT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("agent name pattern is valid")
});

/// How a layer's prompt sections combine with lower layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptMode {
    Extend,
    #[default]
    Override,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolsMode {
    Allow,
    Deny,
    Inherit,
}

/// `tools` entry of a definition document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsDefinition {
    pub mode: ToolsMode,
    #[serde(default)]
    pub names: Vec<String>,
}

/// `budgets` entry of a definition document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BudgetsDefinition {
    pub max_tokens: Option<u64>,
    pub max_duration_ms: Option<u64>,
    pub max_tool_calls: Option<u32>,
}

impl From<&BudgetsDefinition> for Budgets {
    fn from(def: &BudgetsDefinition) -> Self {
        Budgets {
            max_tokens: def.max_tokens,
            max_duration: def.max_duration_ms.map(Duration::from_millis),
            max_tool_calls: def.max_tool_calls,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum PromptValue {
    One(String),
    Many(Vec<String>),
}

/// One agent's entry in a definition document. Every field is optional;
/// absent fields fall through to lower layers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialAgentSpec {
    pub model: Option<String>,
    pub tools: Option<ToolsDefinition>,
    #[serde(default, deserialize_with = "deserialize_prompt")]
    pub prompt: Option<Vec<String>>,
    pub prompt_mode: Option<PromptMode>,
    pub mode: Option<AgentMode>,
    pub description: Option<String>,
    pub budgets: Option<BudgetsDefinition>,
    pub report_format: Option<String>,
}

fn deserialize_prompt<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<PromptValue>::deserialize(deserializer)?;
    Ok(value.map(|v| match v {
        PromptValue::One(text) => vec![text],
        PromptValue::Many(sections) => sections,
    }))
}

impl PartialAgentSpec {
    /// Parse a single entry, naming the agent in any error.
    pub fn from_value(
        source_label: &str,
        agent: &str,
        value: serde_json::Value,
    ) -> Result<Self, ConfigError> {
        let partial: PartialAgentSpec = serde_json::from_value(value)
            .map_err(|e| ConfigError::parse(source_label, Some(agent), e))?;
        partial.check(source_label, agent)?;
        Ok(partial)
    }

    fn check(&self, source_label: &str, agent: &str) -> Result<(), ConfigError> {
        if let Some(model) = &self.model {
            if model.trim().is_empty() {
                return Err(ConfigError::parse(
                    source_label,
                    Some(agent),
                    "field `model` must not be empty",
                ));
            }
        }
        if let Some(tools) = &self.tools {
            if tools.mode == ToolsMode::Inherit && !tools.names.is_empty() {
                return Err(ConfigError::parse(
                    source_label,
                    Some(agent),
                    "field `tools.names` is not allowed with mode `inherit`",
                ));
            }
            if let Some(blank) = tools.names.iter().find(|n| n.trim().is_empty()) {
                return Err(ConfigError::parse(
                    source_label,
                    Some(agent),
                    format!("field `tools.names` contains a blank name {:?}", blank),
                ));
            }
        }
        if self.prompt_mode.is_some() && self.prompt.is_none() {
            return Err(ConfigError::parse(
                source_label,
                Some(agent),
                "field `prompt_mode` requires `prompt`",
            ));
        }
        Ok(())
    }

    /// The model override this entry specifies, if any.
    pub fn model_override(&self) -> Option<ModelOverride> {
        self.model.as_deref().map(|m| {
            if m == INHERIT_MODEL {
                ModelOverride::Inherit
            } else {
                ModelOverride::Explicit(ModelHandle::new(m))
            }
        })
    }

    /// The tool policy this entry specifies, if any.
    pub fn tool_policy(&self) -> Option<ToolPolicy> {
        self.tools.as_ref().map(|t| {
            let mut seen = BTreeSet::new();
            let names: Vec<String> = t
                .names
                .iter()
                .filter(|name| seen.insert(name.as_str()))
                .cloned()
                .collect();
            match t.mode {
                ToolsMode::Allow => ToolPolicy::AllowList(names),
                ToolsMode::Deny => ToolPolicy::DenyList(names),
                ToolsMode::Inherit => ToolPolicy::Inherit,
            }
        })
    }
}

/// All definitions contributed by one source at one precedence layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLayer {
    pub layer: Layer,
    /// Human-readable origin, e.g. a file path or "runtime".
    pub source: String,
    pub agents: BTreeMap<String, PartialAgentSpec>,
}

impl ConfigLayer {
    /// An empty layer.
    pub fn new(layer: Layer, source: impl Into<String>) -> Self {
        Self {
            layer,
            source: source.into(),
            agents: BTreeMap::new(),
        }
    }

    /// Add or replace one agent's partial definition.
    pub fn with_agent(mut self, name: impl Into<String>, partial: PartialAgentSpec) -> Self {
        self.agents.insert(name.into(), partial);
        self
    }

    /// Parse a definition document. Any malformed entry fails the whole layer.
    pub fn from_json(
        layer: Layer,
        source: impl Into<String>,
        content: &str,
    ) -> Result<Self, ConfigError> {
        let source = source.into();
        let document: serde_json::Value =
            serde_json::from_str(content).map_err(|e| ConfigError::parse(&source, None, e))?;
        let serde_json::Value::Object(entries) = document else {
            return Err(ConfigError::parse(
                &source,
                None,
                "expected an object mapping agent names to definitions",
            ));
        };

        let mut agents = BTreeMap::new();
        for (name, value) in entries {
            if !AGENT_NAME.is_match(&name) {
                return Err(ConfigError::parse(
                    &source,
                    Some(&name),
                    "agent names must start with a letter or digit and contain only letters, digits, '-' or '_'",
                ));
            }
            let partial = PartialAgentSpec::from_value(&source, &name, value)?;
            agents.insert(name, partial);
        }

        Ok(Self {
            layer,
            source,
            agents,
        })
    }
}

/// Check an agent name against the naming rule.
pub fn is_valid_agent_name(name: &str) -> bool {
    AGENT_NAME.is_match(name)
}
