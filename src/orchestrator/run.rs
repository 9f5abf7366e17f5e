// ABOUTME: Run state machine and RunHandle for subagent runs.
// ABOUTME: Terminal transitions go through a single compare-and-set on a watch channel.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::budget::RunMeter;
use super::summary::Summary;
use crate::agent::{AgentSpec, Budgets};
use crate::events::{CancelReason, EventBus, EventKind, LifecycleEvent, Progress};
use crate::model::ModelHandle;
use crate::tool::ToolSet;

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    /// Accepted, waiting for a fan-out slot.
    Pending,
    /// The model call is in flight.
    Running,
    Completed { summary: Summary },
    Failed { reason: String },
    Cancelled { reason: CancelReason },
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Completed { .. } | RunState::Failed { .. } | RunState::Cancelled { .. }
        )
    }

    /// The summary, present only once the run has completed.
    pub fn summary(&self) -> Option<&Summary> {
        match self {
            RunState::Completed { summary } => Some(summary),
            _ => None,
        }
    }

    fn event_kind(&self) -> Option<EventKind> {
        match self {
            RunState::Completed { summary } => Some(EventKind::Completed(summary.clone())),
            RunState::Failed { reason } => Some(EventKind::Failed {
                reason: reason.clone(),
            }),
            RunState::Cancelled { reason } => Some(EventKind::Cancelled { reason: *reason }),
            RunState::Pending | RunState::Running => None,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Pending => write!(f, "pending"),
            RunState::Running => write!(f, "running"),
            RunState::Completed { .. } => write!(f, "completed"),
            RunState::Failed { .. } => write!(f, "failed"),
            RunState::Cancelled { .. } => write!(f, "cancelled"),
        }
    }
}

/// Acknowledgement from a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// This request moved the run to Cancelled.
    Cancelled,
    /// The run had already reached a terminal state; nothing changed.
    AlreadyFinished,
    /// No such run (never existed or already retired).
    NotFound,
}

#[derive(Debug, Default)]
struct Timestamps {
    dispatched_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    finished: Option<Instant>,
}

/// Everything the orchestrator tracks about one run.
pub(crate) struct RunRecord {
    pub(crate) run_id: String,
    pub(crate) parent_session_id: String,
    pub(crate) agent: String,
    /// Resolved spec with its effective budgets; `None` if resolution failed.
    pub(crate) spec: Option<Arc<AgentSpec>>,
    pub(crate) model: Option<ModelHandle>,
    pub(crate) tools: ToolSet,
    pub(crate) meter: RunMeter,
    pub(crate) cancel: CancellationToken,
    accepted_at: DateTime<Utc>,
    accepted: Instant,
    times: Mutex<Timestamps>,
    state: watch::Sender<RunState>,
    /// Serializes state changes with the events that announce them.
    transitions: Mutex<()>,
    bus: EventBus,
}

pub(crate) struct RunParts {
    pub run_id: String,
    pub parent_session_id: String,
    pub agent: String,
    pub spec: Option<Arc<AgentSpec>>,
    pub model: Option<ModelHandle>,
    pub tools: ToolSet,
    pub budgets: Budgets,
}

impl RunRecord {
    /// Create a Pending run and announce it with a Started event.
    pub(crate) fn accept(parts: RunParts, bus: EventBus) -> Arc<Self> {
        let (state, _) = watch::channel(RunState::Pending);
        let accepted = Instant::now();
        let record = Arc::new(Self {
            run_id: parts.run_id,
            parent_session_id: parts.parent_session_id,
            agent: parts.agent,
            spec: parts.spec,
            model: parts.model,
            tools: parts.tools,
            meter: RunMeter::new(parts.budgets, accepted),
            cancel: CancellationToken::new(),
            accepted_at: Utc::now(),
            accepted,
            times: Mutex::new(Timestamps::default()),
            state,
            transitions: Mutex::new(()),
            bus,
        });
        record
            .bus
            .record_lineage(record.run_id.clone(), record.parent_session_id.clone());
        record.publish(EventKind::Started);
        record
    }

    pub(crate) fn state(&self) -> RunState {
        self.state.borrow().clone()
    }

    pub(crate) fn is_terminal(&self) -> bool {
        self.state.borrow().is_terminal()
    }

    /// Pending -> Running. Fails if the run is no longer Pending.
    pub(crate) fn mark_running(&self) -> bool {
        let _guard = self.transitions.lock();
        let moved = self.state.send_if_modified(|state| {
            if *state == RunState::Pending {
                *state = RunState::Running;
                true
            } else {
                false
            }
        });
        if moved {
            self.times.lock().dispatched_at = Some(Utc::now());
            if let Some(model) = &self.model {
                self.publish(EventKind::Progress(Progress::Dispatched {
                    model: model.clone(),
                }));
            }
        }
        moved
    }

    /// Move to a terminal state unless one was already recorded.
    ///
    /// Exactly one caller ever wins; only the winner emits the terminal
    /// event. Winning also trips the run's cancellation token so any
    /// in-flight work stops at its next suspension point.
    pub(crate) fn finish(&self, outcome: RunState) -> bool {
        let Some(kind) = outcome.event_kind() else {
            warn!(run_id = %self.run_id, state = %outcome, "ignoring non-terminal finish");
            return false;
        };

        let _guard = self.transitions.lock();
        // The terminal event is published before waiters on the state wake,
        // so anyone who saw the terminal state can also find its event.
        let won = self.state.send_if_modified(|state| {
            if state.is_terminal() {
                return false;
            }
            *state = outcome.clone();
            {
                let mut times = self.times.lock();
                times.finished_at = Some(Utc::now());
                times.finished = Some(Instant::now());
            }
            self.publish(kind);
            true
        });
        if !won {
            return false;
        }
        self.cancel.cancel();

        match &outcome {
            RunState::Completed { summary } => info!(
                run_id = %self.run_id,
                agent = %self.agent,
                parent = %self.parent_session_id,
                tokens = summary.usage.tokens,
                tool_calls = summary.usage.tool_calls,
                "subagent run completed"
            ),
            other => warn!(
                run_id = %self.run_id,
                agent = %self.agent,
                parent = %self.parent_session_id,
                state = %other,
                reason = %describe(other),
                "subagent run did not complete"
            ),
        }

        true
    }

    /// Announce progress, unless the run already ended.
    pub(crate) fn progress(&self, progress: Progress) {
        let _guard = self.transitions.lock();
        if !self.is_terminal() {
            self.publish(EventKind::Progress(progress));
        }
    }

    fn publish(&self, kind: EventKind) {
        self.bus.publish(LifecycleEvent::now(
            self.run_id.clone(),
            self.parent_session_id.clone(),
            self.agent.clone(),
            kind,
        ));
    }

    pub(crate) fn subscribe_state(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    pub(crate) fn duration(&self) -> Duration {
        match self.times.lock().finished {
            Some(end) => end.duration_since(self.accepted),
            None => self.accepted.elapsed(),
        }
    }

    pub(crate) fn snapshot(&self) -> SubagentRun {
        let state = self.state();
        let times = self.times.lock();
        SubagentRun {
            run_id: self.run_id.clone(),
            parent_session_id: self.parent_session_id.clone(),
            agent: self.agent.clone(),
            spec: self.spec.clone(),
            model: self.model.clone(),
            tools: self.tools.names(),
            remaining: self.meter.remaining(),
            state,
            accepted_at: self.accepted_at,
            dispatched_at: times.dispatched_at,
            finished_at: times.finished_at,
        }
    }
}

fn describe(state: &RunState) -> String {
    match state {
        RunState::Failed { reason } => reason.clone(),
        RunState::Cancelled { reason } => reason.to_string(),
        other => other.to_string(),
    }
}

/// Point-in-time view of a run.
#[derive(Debug, Clone)]
pub struct SubagentRun {
    pub run_id: String,
    pub parent_session_id: String,
    pub agent: String,
    /// Resolved spec with effective budgets; `None` if resolution failed.
    pub spec: Option<Arc<AgentSpec>>,
    pub model: Option<ModelHandle>,
    /// Effective tool names, sorted.
    pub tools: Vec<String>,
    pub remaining: Budgets,
    pub state: RunState,
    pub accepted_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SubagentRun {
    pub fn summary(&self) -> Option<&Summary> {
        self.state.summary()
    }
}

/// Handle to a spawned run.
///
/// Cloning is cheap; every clone observes the same run. A handle keeps
/// working after the run is retired from the orchestrator.
#[derive(Clone)]
pub struct RunHandle {
    record: Arc<RunRecord>,
}

impl RunHandle {
    pub(crate) fn new(record: Arc<RunRecord>) -> Self {
        Self { record }
    }

    pub fn run_id(&self) -> &str {
        &self.record.run_id
    }

    pub fn status(&self) -> RunState {
        self.record.state()
    }

    /// Full snapshot of the run.
    pub fn snapshot(&self) -> SubagentRun {
        self.record.snapshot()
    }

    /// True once the run reached Completed, Failed, or Cancelled.
    pub fn is_complete(&self) -> bool {
        self.record.is_terminal()
    }

    /// Wait for the terminal state.
    pub async fn wait(&self) -> RunState {
        let mut rx = self.record.subscribe_state();
        match rx.wait_for(RunState::is_terminal).await {
            Ok(state) => state.clone(),
            Err(_) => self.record.state(),
        }
    }

    /// Wait for the terminal state, giving up after `timeout`.
    pub async fn wait_with_timeout(
        &self,
        timeout: Duration,
    ) -> Result<RunState, tokio::time::error::Elapsed> {
        tokio::time::timeout(timeout, self.wait()).await
    }

    /// Time since acceptance, frozen once the run is terminal.
    pub fn duration(&self) -> Duration {
        self.record.duration()
    }

    /// Request cancellation. Idempotent on finished runs.
    pub fn cancel(&self) -> CancelOutcome {
        cancel_record(&self.record, CancelReason::Requested)
    }
}

impl fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunHandle")
            .field("run_id", &self.record.run_id)
            .field("state", &self.record.state())
            .finish()
    }
}

pub(crate) fn cancel_record(record: &RunRecord, reason: CancelReason) -> CancelOutcome {
    if record.finish(RunState::Cancelled { reason }) {
        CancelOutcome::Cancelled
    } else {
        CancelOutcome::AlreadyFinished
    }
}
