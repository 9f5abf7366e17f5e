// ABOUTME: ConfigMerger - folds ordered partial definitions into frozen AgentSpecs.
// ABOUTME: Applies per-field precedence rules and validates tool references.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::debug;

use super::partial::{ConfigLayer, PartialAgentSpec, PromptMode};
use crate::agent::{AgentMode, AgentSpec, Budgets, Layer};
use crate::error::ConfigError;
use crate::tool::ToolRegistry;

/// Name of the default primary agent.
pub const PRIMARY_AGENT: &str = "primary";

/// Name of the general-purpose built-in subagent.
pub const GENERAL_AGENT: &str = "general";

/// Built-in defaults, the lowest precedence layer.
pub fn builtin_layer() -> ConfigLayer {
    ConfigLayer::new(Layer::Builtin, "builtin")
        .with_agent(
            PRIMARY_AGENT,
            PartialAgentSpec {
                mode: Some(AgentMode::Primary),
                description: Some("Coordinates the session and delegates focused work.".into()),
                ..Default::default()
            },
        )
        .with_agent(
            GENERAL_AGENT,
            PartialAgentSpec {
                mode: Some(AgentMode::Subagent),
                prompt: Some(vec![
                    "You are a general-purpose subagent. Complete the delegated objective \
                     and report back concisely."
                        .into(),
                ]),
                ..Default::default()
            },
        )
}

/// Merge layered partial definitions into frozen specs.
///
/// Layers may be given in any order; they are applied from the lowest
/// precedence to the highest. Per field: scalars take the highest present
/// value, a tool policy replaces wholesale, and prompt sections replace
/// unless the layer is marked `extend`. Nothing is returned unless every
/// merged spec validates against `tools`.
pub fn merge(
    layers: &[ConfigLayer],
    tools: &dyn ToolRegistry,
) -> Result<BTreeMap<String, Arc<AgentSpec>>, ConfigError> {
    check_conflicts(layers)?;

    let mut ordered: Vec<&ConfigLayer> = layers.iter().collect();
    ordered.sort_by_key(|l| l.layer);

    let names: BTreeSet<&String> = ordered.iter().flat_map(|l| l.agents.keys()).collect();

    let mut merged = BTreeMap::new();
    for name in names {
        let mut spec = AgentSpec::new(name.as_str());
        for layer in &ordered {
            if let Some(partial) = layer.agents.get(name) {
                spec = apply(spec, partial, layer.layer);
            }
        }
        validate(&spec, tools)?;
        debug!(agent = %spec.name, layer = %spec.layer, "merged agent spec");
        merged.insert(name.clone(), Arc::new(spec));
    }

    Ok(merged)
}

/// Apply one partial definition on top of `spec`.
pub fn apply(mut spec: AgentSpec, partial: &PartialAgentSpec, layer: Layer) -> AgentSpec {
    if let Some(model) = partial.model_override() {
        spec.model = model;
    }
    if let Some(policy) = partial.tool_policy() {
        spec.tools = policy;
    }
    if let Some(sections) = &partial.prompt {
        match partial.prompt_mode.unwrap_or_default() {
            PromptMode::Extend => spec.prompt_sections.extend(sections.iter().cloned()),
            PromptMode::Override => spec.prompt_sections = sections.clone(),
        }
    }
    if let Some(mode) = partial.mode {
        spec.mode = mode;
    }
    if let Some(description) = &partial.description {
        spec.description = Some(description.clone());
    }
    if let Some(budgets) = &partial.budgets {
        spec.budgets = spec.budgets.overlay(&Budgets::from(budgets));
    }
    if let Some(format) = &partial.report_format {
        spec.report_format = Some(format.clone());
    }
    spec.layer = spec.layer.max(layer);
    spec
}

/// Every tool a spec names must exist in the registry.
pub fn validate(spec: &AgentSpec, tools: &dyn ToolRegistry) -> Result<(), ConfigError> {
    for name in spec.tools.named_tools() {
        if tools.lookup(name).is_none() {
            return Err(ConfigError::InvalidReference {
                agent: spec.name.clone(),
                tool: name.clone(),
            });
        }
    }
    Ok(())
}

fn check_conflicts(layers: &[ConfigLayer]) -> Result<(), ConfigError> {
    let mut seen: BTreeMap<(Layer, &str), &str> = BTreeMap::new();
    for layer in layers {
        for name in layer.agents.keys() {
            if let Some(first) = seen.insert((layer.layer, name.as_str()), layer.source.as_str()) {
                if first != layer.source {
                    return Err(ConfigError::Conflict {
                        agent: name.clone(),
                        first: first.to_string(),
                        second: layer.source.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}
