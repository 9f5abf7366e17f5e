// ABOUTME: Agent spec types - the frozen description of a subagent's model,
// ABOUTME: tool policy, prompt sections, and budgets, plus their origin layer.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::ModelHandle;

/// Where an agent may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    Primary,
    Subagent,
    #[default]
    All,
}

impl AgentMode {
    /// Whether an agent declared with this mode is usable in `wanted`.
    pub fn usable_as(self, wanted: AgentMode) -> bool {
        match (wanted, self) {
            (AgentMode::All, _) => true,
            (_, AgentMode::All) => true,
            (wanted, declared) => wanted == declared,
        }
    }
}

/// Configuration precedence layer, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Builtin,
    User,
    Project,
    Runtime,
    /// Synthesized at invocation time from an inline spec.
    Inline,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Layer::Builtin => "builtin",
            Layer::User => "user",
            Layer::Project => "project",
            Layer::Runtime => "runtime",
            Layer::Inline => "inline",
        };
        write!(f, "{}", name)
    }
}

/// Model selection for an agent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ModelOverride {
    /// Use the parent's model as of spawn time.
    #[default]
    Inherit,
    Explicit(ModelHandle),
}

/// Which of the parent's tools a child may use.
///
/// Listed names keep the order they were declared in, minus duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ToolPolicy {
    #[default]
    Inherit,
    AllowList(Vec<String>),
    DenyList(Vec<String>),
}

impl ToolPolicy {
    /// Tool names the policy mentions explicitly.
    pub fn named_tools(&self) -> &[String] {
        match self {
            ToolPolicy::Inherit => &[],
            ToolPolicy::AllowList(names) | ToolPolicy::DenyList(names) => names,
        }
    }
}

/// Resource ceilings for a run. `None` means "inherit the parent's bound".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Budgets {
    pub max_tokens: Option<u64>,
    pub max_duration: Option<Duration>,
    pub max_tool_calls: Option<u32>,
}

impl Budgets {
    /// No bounds at all.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn max_tokens(mut self, tokens: u64) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    pub fn max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = Some(duration);
        self
    }

    pub fn max_tool_calls(mut self, calls: u32) -> Self {
        self.max_tool_calls = Some(calls);
        self
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_tokens.is_none() && self.max_duration.is_none() && self.max_tool_calls.is_none()
    }

    /// Per-field overlay: fields present in `higher` win.
    pub fn overlay(&self, higher: &Budgets) -> Budgets {
        Budgets {
            max_tokens: higher.max_tokens.or(self.max_tokens),
            max_duration: higher.max_duration.or(self.max_duration),
            max_tool_calls: higher.max_tool_calls.or(self.max_tool_calls),
        }
    }

    /// Per-field minimum; an absent bound on either side yields the other.
    pub fn clamp_to(&self, ceiling: &Budgets) -> Budgets {
        fn min<T: Ord>(a: Option<T>, b: Option<T>) -> Option<T> {
            match (a, b) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            }
        }
        Budgets {
            max_tokens: min(self.max_tokens, ceiling.max_tokens),
            max_duration: min(self.max_duration, ceiling.max_duration),
            max_tool_calls: min(self.max_tool_calls, ceiling.max_tool_calls),
        }
    }

    /// Human-readable constraint lines, in a fixed order.
    pub fn describe_constraints(&self) -> Vec<String> {
        let mut constraints = Vec::new();
        if let Some(tokens) = self.max_tokens {
            constraints.push(format!("Limit total token usage to {} tokens.", tokens));
        }
        if let Some(limit) = self.max_duration {
            constraints.push(format!(
                "Finish the task within {} of wall-clock time.",
                render_duration(limit)
            ));
        }
        if let Some(calls) = self.max_tool_calls {
            constraints.push(format!("Make at most {} tool calls.", calls));
        }
        constraints
    }
}

fn render_duration(duration: Duration) -> String {
    if duration.subsec_millis() == 0 {
        format!("{} seconds", duration.as_secs())
    } else {
        format!("{} milliseconds", duration.as_millis())
    }
}

/// Frozen definition of an agent.
///
/// Specs are shared as `Arc<AgentSpec>` once merged; a run never mutates
/// the spec it was spawned from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSpec {
    /// Unique agent name.
    pub name: String,

    /// Short description appended to the role section.
    pub description: Option<String>,

    pub mode: AgentMode,

    pub model: ModelOverride,

    pub tools: ToolPolicy,

    /// Role prompt sections, joined in order.
    pub prompt_sections: Vec<String>,

    pub budgets: Budgets,

    /// Replaces the default report-format instruction.
    pub report_format: Option<String>,

    /// Highest layer that contributed to this spec.
    pub layer: Layer,
}

impl AgentSpec {
    /// Create a spec with defaults: inherit model and tools, unbounded budgets.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            prompt_sections: vec![format!(
                "You are the {} agent. Respond with actionable assistance.",
                name
            )],
            name,
            description: None,
            mode: AgentMode::All,
            model: ModelOverride::Inherit,
            tools: ToolPolicy::Inherit,
            budgets: Budgets::unbounded(),
            report_format: None,
            layer: Layer::Builtin,
        }
    }

    /// Set an explicit model.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = ModelOverride::Explicit(ModelHandle::new(model));
        self
    }

    pub fn mode(mut self, mode: AgentMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn tools(mut self, policy: ToolPolicy) -> Self {
        self.tools = policy;
        self
    }

    /// Replace the prompt sections.
    pub fn prompt_sections(mut self, sections: Vec<String>) -> Self {
        self.prompt_sections = sections;
        self
    }

    pub fn budgets(mut self, budgets: Budgets) -> Self {
        self.budgets = budgets;
        self
    }

    pub fn report_format(mut self, format: impl Into<String>) -> Self {
        self.report_format = Some(format.into());
        self
    }

    pub fn layer(mut self, layer: Layer) -> Self {
        self.layer = layer;
        self
    }
}
