// ABOUTME: Core types for the model boundary - model handles, usage,
// ABOUTME: tool definitions, and the single-shot response.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier for a model, compared only by equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelHandle {
    id: String,
}

impl ModelHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl From<&str> for ModelHandle {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ModelHandle {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
}

/// Definition of a tool for the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Input plus output tokens.
    pub fn total(&self) -> u64 {
        u64::from(self.input_tokens) + u64::from(self.output_tokens)
    }
}

/// Response from a single model invocation.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    /// Final text produced by the model.
    pub text: String,
    pub stop_reason: StopReason,
    pub usage: Usage,
}

impl ModelResponse {
    /// A completed text response.
    pub fn text(text: impl Into<String>, usage: Usage) -> Self {
        Self {
            text: text.into(),
            stop_reason: StopReason::EndTurn,
            usage,
        }
    }
}
