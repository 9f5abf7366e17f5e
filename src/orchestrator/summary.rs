// ABOUTME: Summary - the only artifact a child run returns to its parent.
// ABOUTME: Parses the model's final text and optional fenced JSON artifact.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::RunError;
use crate::model::{ModelResponse, StopReason};

static JSON_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```json[ \t]*\r?\n(.*?)```").expect("artifact pattern is valid")
});

/// Resources a run actually consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunUsage {
    pub tokens: u64,
    pub tool_calls: u32,
    pub elapsed_ms: u64,
}

/// Final report of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// The model's final text, trimmed.
    pub text: String,

    /// Structured payload from a fenced ```json block, if the model sent one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<serde_json::Value>,

    pub usage: RunUsage,
}

impl Summary {
    /// Validate a model response and turn it into a summary.
    pub fn from_response(response: &ModelResponse, usage: RunUsage) -> Result<Self, RunError> {
        match response.stop_reason {
            StopReason::EndTurn => {}
            StopReason::MaxTokens => {
                return Err(RunError::MalformedResponse(
                    "response was truncated at the output token limit".into(),
                ));
            }
            StopReason::ToolUse => {
                return Err(RunError::MalformedResponse(
                    "response stopped on a pending tool call instead of a summary".into(),
                ));
            }
        }

        let text = response.text.trim();
        if text.is_empty() {
            return Err(RunError::MalformedResponse("response text is empty".into()));
        }

        let artifact = match JSON_BLOCK.captures(text) {
            Some(caps) => {
                let body = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                let value = serde_json::from_str(body).map_err(|e| {
                    RunError::MalformedResponse(format!("invalid JSON artifact: {}", e))
                })?;
                Some(value)
            }
            None => None,
        };

        Ok(Self {
            text: text.to_string(),
            artifact,
            usage,
        })
    }
}
