// ABOUTME: Defines the Tool trait - the capability interface every tool exposes.
// ABOUTME: Tools have a name, description, schema, and async execute method.

use std::sync::Arc;

use async_trait::async_trait;

use super::ToolResult;
use crate::model::ToolDefinition;

/// A tool that can be executed by an agent.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the unique name of this tool.
    fn name(&self) -> &str;

    /// Returns a human-readable description for the model.
    fn description(&self) -> &str;

    /// Returns the JSON Schema for the tool's input parameters.
    fn schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object" })
    }

    /// Execute the tool with the given parameters.
    async fn execute(&self, params: serde_json::Value) -> Result<ToolResult, anyhow::Error>;
}

/// Shared, read-only reference to a tool.
pub type ToolHandle = Arc<dyn Tool>;

/// The tool lookup surface the orchestrator consumes.
///
/// Implementations must hand out snapshots: mutating the registry after a
/// call returns never changes what that call returned.
pub trait ToolRegistry: Send + Sync {
    /// Snapshot of every registered tool.
    fn list(&self) -> super::ToolSet;

    /// Look up a tool by name.
    fn lookup(&self, name: &str) -> Option<ToolHandle>;
}

/// Describe a tool for the model.
pub fn definition_of(tool: &dyn Tool) -> ToolDefinition {
    ToolDefinition {
        name: tool.name().to_string(),
        description: tool.description().to_string(),
        input_schema: tool.schema(),
    }
}
