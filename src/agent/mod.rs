// ABOUTME: Agent module - spec types and the registry of merged agent specs.
// ABOUTME: Specs are frozen once built and shared by reference across runs.

mod registry;
mod spec;

pub use registry::{AgentRef, AgentRegistry};
pub use spec::{AgentMode, AgentSpec, Budgets, Layer, ModelOverride, ToolPolicy};

#[cfg(test)]
mod registry_test;
