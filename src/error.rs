// ABOUTME: Defines all error types for the delegate library using thiserror.
// ABOUTME: Each concern has its own error enum, unified under DelegateError.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Top-level error type for the delegate library.
#[derive(Debug, thiserror::Error)]
pub enum DelegateError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Run error: {0}")]
    Run(#[from] RunError),

    #[error("Spawn error: {0}")]
    Spawn(#[from] SpawnError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),
}

/// Errors from merging and validating layered agent definitions.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A definition document or entry could not be parsed.
    #[error("Parse error in {source_label}{}: {message}", agent_suffix(.agent))]
    Parse {
        source_label: String,
        agent: Option<String>,
        message: String,
    },

    /// Two sources of the same precedence define the same agent.
    #[error("Agent '{agent}' is defined by both {first} and {second}")]
    Conflict {
        agent: String,
        first: String,
        second: String,
    },

    /// A definition names a tool the tool registry does not provide.
    #[error("Agent '{agent}' references unknown tool '{tool}'")]
    InvalidReference { agent: String, tool: String },

    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn agent_suffix(agent: &Option<String>) -> String {
    match agent {
        Some(name) => format!(" (agent '{}')", name),
        None => String::new(),
    }
}

impl ConfigError {
    pub(crate) fn parse(
        source_label: impl Into<String>,
        agent: Option<&str>,
        message: impl fmt::Display,
    ) -> Self {
        ConfigError::Parse {
            source_label: source_label.into(),
            agent: agent.map(str::to_string),
            message: message.to_string(),
        }
    }
}

/// Errors from resolving a spec against a parent's capabilities.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("Tool '{0}' is not available to the parent")]
    UnknownTool(String),
}

/// Which tracked resource ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetKind {
    Tokens,
    Duration,
    ToolCalls,
}

impl fmt::Display for BudgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetKind::Tokens => write!(f, "tokens"),
            BudgetKind::Duration => write!(f, "wall-clock duration"),
            BudgetKind::ToolCalls => write!(f, "tool calls"),
        }
    }
}

/// Errors that end a single subagent run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Budget exceeded: {0}")]
    BudgetExceeded(BudgetKind),

    #[error("Model invocation failed: {0}")]
    ModelInvocationFailed(#[from] ModelError),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Errors returned directly by `spawn_subagent` (before a run exists).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpawnError {
    #[error("Unknown parent session: {0}")]
    UnknownSession(String),

    #[error("Orchestrator is shutting down")]
    ShuttingDown,
}

/// Errors reported by a model client.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Model '{0}' is unavailable")]
    Unavailable(String),

    #[error("Invocation aborted: {0}")]
    Aborted(String),

    #[error("{0}")]
    Other(#[source] anyhow::Error),
}

/// Errors from tool operations.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Execution failed: {0}")]
    Execution(#[source] anyhow::Error),

    #[error("Budget exceeded: {0}")]
    BudgetExceeded(BudgetKind),

    #[error("Run cancelled")]
    Cancelled,
}
