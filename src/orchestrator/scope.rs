// ABOUTME: InvocationScope - what a model client may touch during one run.
// ABOUTME: Gates every tool call and token report through the run's budget.

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use super::run::{RunRecord, RunState};
use crate::agent::Budgets;
use crate::error::{BudgetKind, RunError, ToolError};
use crate::events::{CancelReason, Progress};
use crate::model::ToolDefinition;
use crate::tool::{ToolResult, ToolSet};

/// Passed to [`crate::model::ModelClient::invoke`] for the duration of one run.
///
/// Tool calls made through the scope are checked against the remaining
/// tool-call budget before they execute. Exhausting any budget cancels the
/// run; the model client should then return promptly, since its result
/// will be discarded.
pub struct InvocationScope {
    run: Arc<RunRecord>,
}

impl InvocationScope {
    pub(crate) fn new(run: Arc<RunRecord>) -> Self {
        Self { run }
    }

    pub fn run_id(&self) -> &str {
        &self.run.run_id
    }

    /// The run's effective tools.
    pub fn tools(&self) -> &ToolSet {
        &self.run.tools
    }

    /// The run's effective tools, described for the model.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.run.tools.to_definitions()
    }

    /// Budget left right now.
    pub fn remaining(&self) -> Budgets {
        self.run.meter.remaining()
    }

    /// True once the run has ended for any reason.
    pub fn is_cancelled(&self) -> bool {
        self.run.cancel.is_cancelled()
    }

    /// Resolves when the run ends for any reason.
    pub async fn cancelled(&self) {
        self.run.cancel.cancelled().await
    }

    /// Charge tokens consumed so far in the call.
    ///
    /// Going over the token budget cancels the run.
    pub fn report_usage(&self, tokens: u64) -> Result<(), RunError> {
        if let Err(kind) = self.run.meter.consume_tokens(tokens) {
            self.exhaust(kind);
            return Err(RunError::BudgetExceeded(kind));
        }
        Ok(())
    }

    /// Invoke one of the run's tools, subject to its budget.
    ///
    /// Unknown tools and non-object parameters are refused without
    /// spending a tool call.
    pub async fn invoke_tool(
        &self,
        name: &str,
        params: serde_json::Value,
    ) -> Result<ToolResult, ToolError> {
        if self.is_cancelled() {
            return Err(ToolError::Cancelled);
        }
        let tool = self
            .run
            .tools
            .get(name)
            .cloned()
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        if !params.is_object() {
            return Err(ToolError::InvalidParams(format!(
                "'{}' expects a JSON object, got {}",
                name, params
            )));
        }

        if let Err(kind) = self.run.meter.try_tool_call() {
            self.exhaust(kind);
            return Err(ToolError::BudgetExceeded(kind));
        }
        self.run.progress(Progress::ToolCall {
            name: name.to_string(),
        });
        debug!(run_id = %self.run.run_id, tool = name, "tool call admitted");

        let started = Instant::now();
        let result = tokio::select! {
            biased;
            _ = self.run.cancel.cancelled() => return Err(ToolError::Cancelled),
            result = tool.execute(params) => result.map_err(ToolError::Execution)?,
        };
        Ok(result
            .with_metadata("run_id", &self.run.run_id)
            .with_metadata("elapsed_ms", started.elapsed().as_millis() as u64))
    }

    fn exhaust(&self, kind: BudgetKind) {
        self.run.finish(RunState::Cancelled {
            reason: CancelReason::BudgetExceeded(kind),
        });
    }
}
