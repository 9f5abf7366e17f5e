// ABOUTME: ToolResult - what a tool call hands back to the model client,
// ABOUTME: with an error flag and ordered metadata stamped by the run scope.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::ToolError;

/// Outcome of one tool call made during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub content: String,

    /// Set when the tool reports a failure the model should see.
    pub is_error: bool,

    /// Ordered so rendered output is stable across calls.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ToolResult {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
            metadata: BTreeMap::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: message.into(),
            is_error: true,
            metadata: BTreeMap::new(),
        }
    }

    /// Turn a refused or failed call into something the model can read.
    ///
    /// Returns `None` when the run itself has ended, since nothing further
    /// should be sent to the model.
    pub fn from_failure(err: &ToolError) -> Option<Self> {
        match err {
            ToolError::Cancelled | ToolError::BudgetExceeded(_) => None,
            other => Some(Self::error(other.to_string())),
        }
    }

    /// Values that fail to serialize are skipped.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.metadata.insert(key.into(), v);
        }
        self
    }

    /// Text to place in the model's conversation for this call.
    pub fn for_model(&self) -> String {
        if self.is_error {
            format!("Error: {}", self.content)
        } else {
            self.content.clone()
        }
    }
}
