// ABOUTME: Pure resolution of "inherit" semantics against a parent snapshot.
// ABOUTME: Allow lists fail closed; deny lists subtract from the parent's tools.

use crate::agent::{AgentSpec, Budgets, ModelOverride, ToolPolicy};
use crate::error::ResolutionError;
use crate::model::ModelHandle;
use crate::tool::ToolSet;

/// A parent's model, tools, and budget as of one instant.
///
/// Snapshots are plain values; later changes to the parent never reach a
/// snapshot that was already taken.
#[derive(Debug, Clone)]
pub struct ParentSnapshot {
    pub model: ModelHandle,
    pub tools: ToolSet,
    pub budgets: Budgets,
}

impl ParentSnapshot {
    pub fn new(model: impl Into<ModelHandle>, tools: ToolSet) -> Self {
        Self {
            model: model.into(),
            tools,
            budgets: Budgets::unbounded(),
        }
    }

    pub fn with_budgets(mut self, budgets: Budgets) -> Self {
        self.budgets = budgets;
        self
    }
}

/// The effective capabilities of one child run.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub model: ModelHandle,
    pub tools: ToolSet,
    pub budgets: Budgets,
}

/// Explicit override wins; otherwise the parent's model, unchanged.
pub fn resolve_model(spec: &AgentSpec, parent_model: &ModelHandle) -> ModelHandle {
    match &spec.model {
        ModelOverride::Explicit(model) => model.clone(),
        ModelOverride::Inherit => parent_model.clone(),
    }
}

/// Apply the spec's tool policy to the parent's tools.
pub fn resolve_tools(spec: &AgentSpec, parent_tools: &ToolSet) -> Result<ToolSet, ResolutionError> {
    match &spec.tools {
        ToolPolicy::Inherit => Ok(parent_tools.clone()),
        ToolPolicy::AllowList(names) => {
            if let Some(missing) = names.iter().find(|n| !parent_tools.contains(n)) {
                return Err(ResolutionError::UnknownTool(missing.clone()));
            }
            Ok(parent_tools.filtered(|name| names.iter().any(|n| n == name)))
        }
        ToolPolicy::DenyList(names) => {
            Ok(parent_tools.filtered(|name| !names.iter().any(|n| n == name)))
        }
    }
}

/// Effective budget: spawn override, then the spec, then the parent, per
/// field; the result never exceeds the parent's bound.
pub fn resolve_budgets(declared: &Budgets, spawn_override: Option<&Budgets>, parent: &Budgets) -> Budgets {
    let requested = match spawn_override {
        Some(over) => declared.overlay(over),
        None => *declared,
    };
    parent.overlay(&requested).clamp_to(parent)
}

/// Resolve everything a run needs from its parent in one step.
pub fn resolve(
    spec: &AgentSpec,
    parent: &ParentSnapshot,
    budget_override: Option<&Budgets>,
) -> Result<Resolved, ResolutionError> {
    Ok(Resolved {
        model: resolve_model(spec, &parent.model),
        tools: resolve_tools(spec, &parent.tools)?,
        budgets: resolve_budgets(&spec.budgets, budget_override, &parent.budgets),
    })
}
