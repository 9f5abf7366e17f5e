// ABOUTME: Prelude module - convenient imports for common use cases.
// ABOUTME: Use `use delegate::prelude::*;` to get started quickly.

pub use crate::agent::{
    AgentMode, AgentRef, AgentRegistry, AgentSpec, Budgets, Layer, ModelOverride, ToolPolicy,
};
pub use crate::config::{ConfigLayer, ConfigLoader, OrchestratorConfig, PartialAgentSpec};
pub use crate::error::{
    BudgetKind, ConfigError, DelegateError, ModelError, ResolutionError, RunError, SpawnError,
    ToolError,
};
pub use crate::events::{CancelReason, EventBus, EventKind, LifecycleEvent, Progress, Subscription};
pub use crate::logging::{LogConfig, LogOutput};
pub use crate::model::{
    ModelClient, ModelHandle, ModelResponse, StopReason, ToolDefinition, Usage,
};
pub use crate::orchestrator::{
    CancelOutcome, InvocationScope, RunHandle, RunState, SubagentOrchestrator, SubagentRun,
    Summary,
};
pub use crate::prompt::{PromptContext, ProjectRules, RulesLayout, RulesSource};
pub use crate::resolve::ParentSnapshot;
pub use crate::tool::{Registry, Tool, ToolRegistry, ToolResult, ToolSet};
