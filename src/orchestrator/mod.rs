// ABOUTME: Orchestrator module - run lifecycle, budgets, fan-out, and sessions.
// ABOUTME: SubagentOrchestrator is the only caller of the model client.

mod budget;
mod limiter;
mod orchestrator;
mod run;
mod scope;
mod session;
mod summary;

pub use limiter::{AdmissionError, FanOutLimiter};
pub use orchestrator::{OrchestratorBuilder, SubagentOrchestrator};
pub use run::{CancelOutcome, RunHandle, RunState, SubagentRun};
pub use scope::InvocationScope;
pub use summary::{RunUsage, Summary};
