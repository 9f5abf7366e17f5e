// ABOUTME: LifecycleEvent - notification of a run's state transition.
// ABOUTME: Serializes as {run_id, parent_session_id, agent, timestamp, kind, payload}.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BudgetKind;
use crate::model::ModelHandle;
use crate::orchestrator::Summary;

/// Why a run was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cause", content = "budget", rename_all = "snake_case")]
pub enum CancelReason {
    /// A tracked resource ran out.
    BudgetExceeded(BudgetKind),

    /// `cancel_run` or `RunHandle::cancel` was called.
    Requested,

    /// The orchestrator shut down while the run was live.
    Shutdown,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::BudgetExceeded(kind) => write!(f, "budget exceeded: {}", kind),
            CancelReason::Requested => write!(f, "cancelled by request"),
            CancelReason::Shutdown => write!(f, "orchestrator shut down"),
        }
    }
}

/// Non-terminal progress notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Progress {
    /// The run won a fan-out slot and its model call is being issued.
    Dispatched { model: ModelHandle },

    /// The budget gate admitted a tool invocation.
    ToolCall { name: String },
}

/// What happened to the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum EventKind {
    Started,
    Progress(Progress),
    Completed(Summary),
    Failed { reason: String },
    Cancelled { reason: CancelReason },
}

impl EventKind {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EventKind::Completed(_) | EventKind::Failed { .. } | EventKind::Cancelled { .. }
        )
    }

    /// Short lowercase name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Started => "started",
            EventKind::Progress(_) => "progress",
            EventKind::Completed(_) => "completed",
            EventKind::Failed { .. } => "failed",
            EventKind::Cancelled { .. } => "cancelled",
        }
    }
}

/// One lifecycle notification for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub run_id: String,
    pub parent_session_id: String,
    pub agent: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl LifecycleEvent {
    /// Create an event stamped with the current time.
    pub fn now(
        run_id: impl Into<String>,
        parent_session_id: impl Into<String>,
        agent: impl Into<String>,
        kind: EventKind,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            parent_session_id: parent_session_id.into(),
            agent: agent.into(),
            timestamp: Utc::now(),
            kind,
        }
    }
}
