// ABOUTME: SubagentOrchestrator - accepts spawn requests and drives each run
// ABOUTME: from Pending to a terminal state under fan-out and budget limits.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::limiter::{AdmissionError, FanOutLimiter};
use super::run::{CancelOutcome, RunHandle, RunParts, RunRecord, RunState, SubagentRun, cancel_record};
use super::scope::InvocationScope;
use super::session::SessionTable;
use super::summary::Summary;
use crate::agent::{AgentMode, AgentRef, AgentRegistry, AgentSpec, Budgets};
use crate::config::OrchestratorConfig;
use crate::error::{BudgetKind, DelegateError, RunError, SpawnError};
use crate::events::{CancelReason, EventBus, Subscription};
use crate::model::{ModelClient, ModelHandle};
use crate::prompt::{self, DEFAULT_CONSTRAINT, ProjectRules, PromptContext, RulesSource};
use crate::resolve::{self, ParentSnapshot, Resolved};
use crate::tool::{Registry, ToolRegistry, ToolSet};

/// Builder for [`SubagentOrchestrator`].
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    agents: AgentRegistry,
    tools: Arc<dyn ToolRegistry>,
    model: Arc<dyn ModelClient>,
    bus: Option<EventBus>,
    rules: Option<RulesSource>,
    constraints: Vec<String>,
    report_format: Option<String>,
}

impl OrchestratorBuilder {
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn agents(mut self, agents: AgentRegistry) -> Self {
        self.agents = agents;
        self
    }

    /// The registry inline specs are validated against.
    pub fn tools(mut self, tools: Arc<dyn ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    /// Use an existing bus instead of creating one from the config.
    pub fn event_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Where to discover project rules for each invocation.
    pub fn rules(mut self, rules: RulesSource) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Replace the constraint lines added to every prompt.
    pub fn constraints(mut self, constraints: Vec<String>) -> Self {
        self.constraints = constraints;
        self
    }

    /// Report-format instruction for agents that do not set their own.
    pub fn report_format(mut self, format: impl Into<String>) -> Self {
        self.report_format = Some(format.into());
        self
    }

    pub fn build(self) -> SubagentOrchestrator {
        let bus = self
            .bus
            .unwrap_or_else(|| EventBus::new(self.config.event_queue_capacity));
        SubagentOrchestrator {
            inner: Arc::new(Inner {
                limiter: FanOutLimiter::new(self.config.max_concurrent),
                config: self.config,
                agents: self.agents,
                tools: self.tools,
                model: self.model,
                bus,
                rules: self.rules,
                constraints: self.constraints,
                report_format: self.report_format,
                sessions: SessionTable::default(),
                runs: RwLock::new(HashMap::new()),
                shutting_down: AtomicBool::new(false),
            }),
        }
    }
}

struct Inner {
    config: OrchestratorConfig,
    agents: AgentRegistry,
    tools: Arc<dyn ToolRegistry>,
    model: Arc<dyn ModelClient>,
    bus: EventBus,
    limiter: FanOutLimiter,
    rules: Option<RulesSource>,
    constraints: Vec<String>,
    report_format: Option<String>,
    sessions: SessionTable,
    runs: RwLock<HashMap<String, Arc<RunRecord>>>,
    shutting_down: AtomicBool,
}

struct Prepared {
    spec: Arc<AgentSpec>,
    resolved: Resolved,
}

/// Coordinates every subagent run for a set of parent sessions.
///
/// Each run gets exactly one model invocation. Runs are independent: a
/// failure ends only the run it happened in. `spawn_subagent` must be
/// called from within a Tokio runtime.
#[derive(Clone)]
pub struct SubagentOrchestrator {
    inner: Arc<Inner>,
}

impl SubagentOrchestrator {
    /// Start building an orchestrator around `model`.
    pub fn builder(model: Arc<dyn ModelClient>) -> OrchestratorBuilder {
        OrchestratorBuilder {
            config: OrchestratorConfig::default(),
            agents: AgentRegistry::builtin(),
            tools: Arc::new(Registry::new()),
            model,
            bus: None,
            rules: None,
            constraints: vec![DEFAULT_CONSTRAINT.to_string()],
            report_format: None,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.inner.agents
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Events for runs spawned by `session_id` and by its descendants.
    pub fn subscribe(&self, session_id: impl Into<String>) -> Subscription {
        self.inner.bus.subscribe(session_id)
    }

    /// Register (or replace) a parent session's current model, tools, and budget.
    pub fn register_session(&self, session_id: impl Into<String>, snapshot: ParentSnapshot) {
        let session_id = session_id.into();
        debug!(session = %session_id, model = %snapshot.model, "registered session");
        self.inner.sessions.register(session_id, snapshot);
    }

    /// Change a session's active model. Runs already spawned are unaffected.
    pub fn set_session_model(
        &self,
        session_id: &str,
        model: impl Into<ModelHandle>,
    ) -> Result<(), SpawnError> {
        self.inner.sessions.set_model(session_id, model.into())
    }

    /// Change a session's tools. Runs already spawned are unaffected.
    pub fn set_session_tools(&self, session_id: &str, tools: ToolSet) -> Result<(), SpawnError> {
        self.inner.sessions.set_tools(session_id, tools)
    }

    /// Change a session's budget. Runs already spawned are unaffected.
    pub fn set_session_budgets(&self, session_id: &str, budgets: Budgets) -> Result<(), SpawnError> {
        self.inner.sessions.set_budgets(session_id, budgets)
    }

    /// Forget a session. Its live runs keep going with their snapshots.
    pub fn end_session(&self, session_id: &str) -> bool {
        self.inner.sessions.remove(session_id)
    }

    /// Spawn a child run and return without waiting for it.
    ///
    /// The parent may be a registered session or a live run. The parent's
    /// model, tools, and budget are captured now. Problems with the agent
    /// itself (unknown name, bad inline spec, unknown tool) do not return an
    /// error: the run is created and immediately fails with the reason.
    pub fn spawn_subagent(
        &self,
        parent_session_id: &str,
        agent: impl Into<AgentRef>,
        objective: impl Into<String>,
        budget_override: Option<Budgets>,
    ) -> Result<RunHandle, SpawnError> {
        if self.inner.shutting_down.load(Ordering::Acquire) {
            return Err(SpawnError::ShuttingDown);
        }
        let parent = self
            .inner
            .parent_snapshot(parent_session_id)
            .ok_or_else(|| SpawnError::UnknownSession(parent_session_id.to_string()))?;

        let agent = agent.into();
        let objective = objective.into();
        let run_id = format!("run-{}", Uuid::new_v4());

        let prepared = self.inner.prepare(&agent, &parent, budget_override.as_ref());
        let parts = match &prepared {
            Ok(p) => RunParts {
                run_id: run_id.clone(),
                parent_session_id: parent_session_id.to_string(),
                agent: agent.name().to_string(),
                spec: Some(Arc::clone(&p.spec)),
                model: Some(p.resolved.model.clone()),
                tools: p.resolved.tools.clone(),
                budgets: p.resolved.budgets,
            },
            Err(_) => RunParts {
                run_id: run_id.clone(),
                parent_session_id: parent_session_id.to_string(),
                agent: agent.name().to_string(),
                spec: None,
                model: None,
                tools: ToolSet::new(),
                budgets: Budgets::unbounded(),
            },
        };

        let run = RunRecord::accept(parts, self.inner.bus.clone());
        self.inner
            .runs
            .write()
            .insert(run_id.clone(), Arc::clone(&run));
        info!(
            run_id = %run_id,
            agent = %agent.name(),
            parent = %parent_session_id,
            "accepted subagent run"
        );

        if let Err(reason) = prepared {
            run.finish(RunState::Failed { reason });
        }

        let task = tokio::spawn(drive(Arc::clone(&self.inner), Arc::clone(&run), objective));
        tokio::spawn(supervise(
            Arc::downgrade(&self.inner),
            Arc::clone(&run),
            task,
        ));

        Ok(RunHandle::new(run))
    }

    /// Snapshot of a run, or `None` if unknown or retired.
    pub fn get_run_status(&self, run_id: &str) -> Option<SubagentRun> {
        self.inner.run(run_id).map(|run| run.snapshot())
    }

    /// A handle to a run that is still retained.
    pub fn run_handle(&self, run_id: &str) -> Option<RunHandle> {
        self.inner.run(run_id).map(RunHandle::new)
    }

    /// Cancel a run. Cancelling a finished run changes nothing.
    pub fn cancel_run(&self, run_id: &str) -> CancelOutcome {
        match self.inner.run(run_id) {
            Some(run) => cancel_record(&run, CancelReason::Requested),
            None => CancelOutcome::NotFound,
        }
    }

    /// Drop a finished run now instead of after the retention period.
    pub fn retire_run(&self, run_id: &str) -> bool {
        self.inner.retire(run_id)
    }

    /// Snapshots of every retained run.
    pub fn runs(&self) -> Vec<SubagentRun> {
        self.inner
            .runs
            .read()
            .values()
            .map(|run| run.snapshot())
            .collect()
    }

    /// Number of runs not yet in a terminal state.
    pub fn active_runs(&self) -> usize {
        self.inner
            .runs
            .read()
            .values()
            .filter(|run| !run.is_terminal())
            .count()
    }

    /// Refuse new spawns, cancel every live run, and close the event bus.
    pub fn shutdown(&self) {
        if self.inner.shutting_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.limiter.close();
        let live: Vec<Arc<RunRecord>> = self.inner.runs.read().values().cloned().collect();
        let mut cancelled = 0;
        for run in live {
            if cancel_record(&run, CancelReason::Shutdown) == CancelOutcome::Cancelled {
                cancelled += 1;
            }
        }
        self.inner.bus.close();
        info!(cancelled, "orchestrator shut down");
    }
}

impl Inner {
    fn run(&self, run_id: &str) -> Option<Arc<RunRecord>> {
        self.runs.read().get(run_id).cloned()
    }

    /// A registered session, or a live run acting as a parent.
    fn parent_snapshot(&self, session_id: &str) -> Option<ParentSnapshot> {
        if let Some(snapshot) = self.sessions.snapshot(session_id) {
            return Some(snapshot);
        }
        let run = self.run(session_id)?;
        if run.is_terminal() {
            return None;
        }
        Some(ParentSnapshot {
            model: run.model.clone()?,
            tools: run.tools.clone(),
            budgets: run.meter.remaining(),
        })
    }

    fn prepare(
        &self,
        agent: &AgentRef,
        parent: &ParentSnapshot,
        budget_override: Option<&Budgets>,
    ) -> Result<Prepared, String> {
        let spec = self
            .agents
            .resolve(agent, self.tools.as_ref())
            .map_err(|e| DelegateError::from(e).to_string())?
            .ok_or_else(|| format!("Unknown agent '{}'", agent.name()))?;

        if !spec.mode.usable_as(AgentMode::Subagent) {
            return Err(format!(
                "Agent '{}' is primary-only and cannot run as a subagent",
                spec.name
            ));
        }

        let resolved = resolve::resolve(&spec, parent, budget_override)
            .map_err(|e| DelegateError::from(e).to_string())?;
        let spec = Arc::new(spec.as_ref().clone().budgets(resolved.budgets));
        Ok(Prepared { spec, resolved })
    }

    fn context(&self, objective: String, rules: ProjectRules) -> PromptContext {
        let mut context = PromptContext::new(objective)
            .with_rules(rules)
            .with_constraints(self.constraints.clone());
        if let Some(format) = &self.report_format {
            context = context.with_report_format(format.clone());
        }
        context
    }

    async fn load_rules(&self) -> ProjectRules {
        let Some(source) = self.rules.clone() else {
            return ProjectRules::empty();
        };
        match tokio::task::spawn_blocking(move || source.load()).await {
            Ok(rules) => rules,
            Err(e) => {
                warn!(error = %e, "project rule discovery failed");
                ProjectRules::empty()
            }
        }
    }

    fn retire(&self, run_id: &str) -> bool {
        let mut runs = self.runs.write();
        match runs.get(run_id) {
            Some(run) if run.is_terminal() => {
                runs.remove(run_id);
                drop(runs);
                self.bus.forget_lineage(run_id);
                debug!(run_id, "retired subagent run");
                true
            }
            _ => false,
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}

fn budget_exceeded(kind: BudgetKind) -> RunState {
    RunState::Cancelled {
        reason: CancelReason::BudgetExceeded(kind),
    }
}

/// Drive one accepted run to a terminal state.
async fn drive(inner: Arc<Inner>, run: Arc<RunRecord>, objective: String) {
    let (Some(spec), Some(model)) = (run.spec.clone(), run.model.clone()) else {
        return;
    };

    if let Some(kind) = run.meter.exhausted() {
        run.finish(budget_exceeded(kind));
        return;
    }

    let rules = inner.load_rules().await;
    let prompt = prompt::build(&spec, &inner.context(objective, rules));
    let deadline = run.meter.deadline();

    let admitted = tokio::select! {
        biased;
        _ = sleep_until_deadline(deadline) => {
            run.finish(budget_exceeded(BudgetKind::Duration));
            return;
        }
        admitted = inner.limiter.acquire_with_cancel(run.cancel.cancelled()) => admitted,
    };
    let _permit = match admitted {
        Ok(permit) => permit,
        Err(AdmissionError::Cancelled) => return,
        Err(AdmissionError::Closed) => {
            run.finish(RunState::Cancelled {
                reason: CancelReason::Shutdown,
            });
            return;
        }
    };

    if !run.mark_running() {
        return;
    }
    info!(run_id = %run.run_id, agent = %run.agent, model = %model, "dispatching subagent run");

    let scope = InvocationScope::new(Arc::clone(&run));
    let budget = run.meter.remaining();
    let result = tokio::select! {
        biased;
        _ = run.cancel.cancelled() => {
            debug!(run_id = %run.run_id, "run ended while the model call was in flight");
            return;
        }
        _ = sleep_until_deadline(deadline) => {
            run.finish(budget_exceeded(BudgetKind::Duration));
            return;
        }
        result = inner.model.invoke(&model, &prompt, &scope, &budget) => result,
    };

    let outcome = match result {
        Err(e) => RunState::Failed {
            reason: RunError::ModelInvocationFailed(e).to_string(),
        },
        Ok(response) => match run.meter.settle_tokens(response.usage.total()) {
            Err(kind) => budget_exceeded(kind),
            Ok(()) => match Summary::from_response(&response, run.meter.usage()) {
                Ok(summary) => RunState::Completed { summary },
                Err(e) => RunState::Failed {
                    reason: e.to_string(),
                },
            },
        },
    };

    if !run.finish(outcome) {
        debug!(run_id = %run.run_id, "discarding late model result");
    }
}

/// Contain a run task's panic, then retire the run after the retention period.
async fn supervise(inner: Weak<Inner>, run: Arc<RunRecord>, task: tokio::task::JoinHandle<()>) {
    if let Err(e) = task.await {
        warn!(run_id = %run.run_id, error = %e, "subagent run task aborted");
        run.finish(RunState::Failed {
            reason: "run task aborted unexpectedly".to_string(),
        });
    }
    if !run.is_terminal() {
        run.finish(RunState::Failed {
            reason: "run ended without a result".to_string(),
        });
    }

    let Some(retention) = inner.upgrade().map(|i| i.config.retention_duration()) else {
        return;
    };
    tokio::time::sleep(retention).await;
    if let Some(inner) = inner.upgrade() {
        inner.retire(&run.run_id);
    }
}
