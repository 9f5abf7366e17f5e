// ABOUTME: RunMeter - tracks what a run has consumed against its effective budget.
// ABOUTME: Remaining budget only ever shrinks; exhaustion is reported per resource.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::summary::RunUsage;
use crate::agent::Budgets;
use crate::error::BudgetKind;

#[derive(Debug, Default, Clone, Copy)]
struct Consumed {
    tokens: u64,
    tool_calls: u32,
}

/// Budget gate for one run.
#[derive(Debug)]
pub(crate) struct RunMeter {
    limits: Budgets,
    accepted: Instant,
    consumed: Mutex<Consumed>,
}

impl RunMeter {
    pub(crate) fn new(limits: Budgets, accepted: Instant) -> Self {
        Self {
            limits,
            accepted,
            consumed: Mutex::new(Consumed::default()),
        }
    }

    /// When the wall-clock budget runs out, if there is one.
    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.limits.max_duration.map(|limit| self.accepted + limit)
    }

    /// What is left right now. Unbounded fields stay `None`.
    pub(crate) fn remaining(&self) -> Budgets {
        let consumed = *self.consumed.lock();
        Budgets {
            max_tokens: self
                .limits
                .max_tokens
                .map(|limit| limit.saturating_sub(consumed.tokens)),
            max_duration: self
                .limits
                .max_duration
                .map(|limit| limit.saturating_sub(self.accepted.elapsed())),
            max_tool_calls: self
                .limits
                .max_tool_calls
                .map(|limit| limit.saturating_sub(consumed.tool_calls)),
        }
    }

    /// The first resource already at zero, checked before dispatch.
    pub(crate) fn exhausted(&self) -> Option<BudgetKind> {
        let remaining = self.remaining();
        if remaining.max_tokens == Some(0) {
            Some(BudgetKind::Tokens)
        } else if remaining.max_duration == Some(Duration::ZERO) {
            Some(BudgetKind::Duration)
        } else if remaining.max_tool_calls == Some(0) {
            Some(BudgetKind::ToolCalls)
        } else {
            None
        }
    }

    /// Reserve one tool call. Nothing is consumed when the budget is spent.
    pub(crate) fn try_tool_call(&self) -> Result<(), BudgetKind> {
        let mut consumed = self.consumed.lock();
        if let Some(limit) = self.limits.max_tool_calls {
            if consumed.tool_calls >= limit {
                return Err(BudgetKind::ToolCalls);
            }
        }
        consumed.tool_calls += 1;
        Ok(())
    }

    /// Charge `tokens` more tokens; fails if that goes over the limit.
    pub(crate) fn consume_tokens(&self, tokens: u64) -> Result<(), BudgetKind> {
        let mut consumed = self.consumed.lock();
        let total = consumed.tokens.saturating_add(tokens);
        if let Some(limit) = self.limits.max_tokens {
            if total > limit {
                consumed.tokens = limit;
                return Err(BudgetKind::Tokens);
            }
        }
        consumed.tokens = total;
        Ok(())
    }

    /// Reconcile with the model's final usage report. Tokens already
    /// reported during the call are not charged twice.
    pub(crate) fn settle_tokens(&self, total: u64) -> Result<(), BudgetKind> {
        let already = self.consumed.lock().tokens;
        self.consume_tokens(total.saturating_sub(already))
    }

    pub(crate) fn usage(&self) -> RunUsage {
        let consumed = *self.consumed.lock();
        RunUsage {
            tokens: consumed.tokens,
            tool_calls: consumed.tool_calls,
            elapsed_ms: u64::try_from(self.accepted.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
}
