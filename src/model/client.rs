// ABOUTME: Defines the ModelClient trait - the single-shot invocation boundary
// ABOUTME: through which every subagent run talks to a language model.

use async_trait::async_trait;

use super::{ModelHandle, ModelResponse};
use crate::agent::Budgets;
use crate::error::ModelError;
use crate::orchestrator::InvocationScope;

/// Trait for model client implementations.
///
/// Each subagent run calls `invoke` exactly once. The client may call tools
/// through `scope`, which enforces the run's budgets and cancellation; it may
/// also report token usage early via [`InvocationScope::report_usage`].
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn invoke(
        &self,
        model: &ModelHandle,
        prompt: &str,
        scope: &InvocationScope,
        budget: &Budgets,
    ) -> Result<ModelResponse, ModelError>;
}
