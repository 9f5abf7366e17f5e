// ABOUTME: PromptContext and project-rule discovery for subagent prompts.
// ABOUTME: Rules are read in a fixed order; unreadable sources are skipped.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Instruction appended to every CONSTRAINTS section unless replaced.
pub const DEFAULT_CONSTRAINT: &str = "Stream only final summaries back to the parent session.";

/// Report instruction used when neither the agent nor the context sets one.
pub const DEFAULT_REPORT_FORMAT: &str =
    "Return a concise summary of the task outcome, including key decisions and follow-up steps.";

/// Which files count as project rules, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulesLayout {
    /// Top-level rules file, read first.
    pub top_level: String,

    /// Agent-rules file, read second.
    pub agent_rules: String,

    /// Glob patterns (relative to the root) for override docs, read last.
    pub override_patterns: Vec<String>,
}

impl Default for RulesLayout {
    fn default() -> Self {
        Self {
            top_level: "AGENTS.md".to_string(),
            agent_rules: "CLAUDE.md".to_string(),
            override_patterns: vec!["migration/**/*.md".to_string()],
        }
    }
}

/// One section of project rules with its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSection {
    /// "instructions" or the file path relative to the project root.
    pub source: String,
    pub content: String,
}

/// Ordered project-rule text gathered for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectRules {
    sections: Vec<RuleSection>,
}

impl ProjectRules {
    /// No rules at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from explicit sections, kept in the given order.
    pub fn from_sections(sections: Vec<RuleSection>) -> Self {
        Self { sections }
    }

    /// Read rules from disk.
    ///
    /// Configured `instructions` come first, then the top-level rules file,
    /// then the agent-rules file, then override docs sorted by path. Blank or
    /// unreadable files are left out.
    pub fn discover(root: &Path, layout: &RulesLayout, instructions: &[String]) -> Self {
        let mut sections = Vec::new();

        let instructions: Vec<&str> = instructions
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if !instructions.is_empty() {
            sections.push(RuleSection {
                source: "instructions".to_string(),
                content: instructions.join("\n"),
            });
        }

        let mut files = vec![root.join(&layout.top_level), root.join(&layout.agent_rules)];
        files.extend(override_docs(root, &layout.override_patterns));

        for path in files {
            if let Some(section) = read_section(root, &path) {
                sections.push(section);
            }
        }

        Self { sections }
    }

    pub fn sections(&self) -> &[RuleSection] {
        &self.sections
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Render the PROJECT_RULES body.
    pub fn render(&self) -> String {
        if self.sections.is_empty() {
            return "No repository-specific instructions were discovered.".to_string();
        }
        self.sections
            .iter()
            .map(|section| {
                if section.source == "instructions" {
                    format!("# Project instructions\n{}", section.content)
                } else {
                    format!("# Source: {}\n{}", section.source, section.content)
                }
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn override_docs(root: &Path, patterns: &[String]) -> Vec<PathBuf> {
    let base = glob::Pattern::escape(&root.to_string_lossy());
    let mut docs = Vec::new();
    for pattern in patterns {
        let full = format!("{}/{}", base, pattern);
        match glob::glob(&full) {
            Ok(paths) => docs.extend(paths.filter_map(Result::ok).filter(|p| p.is_file())),
            Err(e) => debug!(pattern = %pattern, error = %e, "skipping invalid rule pattern"),
        }
    }
    docs.sort();
    docs.dedup();
    docs
}

fn read_section(root: &Path, path: &Path) -> Option<RuleSection> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "rule source not readable");
            return None;
        }
    };
    let content = content.trim();
    if content.is_empty() {
        return None;
    }
    let relative = path.strip_prefix(root).unwrap_or(path);
    Some(RuleSection {
        source: relative.to_string_lossy().replace('\\', "/"),
        content: content.to_string(),
    })
}

/// Snapshot of everything besides the spec that shapes a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext {
    /// The task the child must accomplish.
    pub objective: String,

    pub rules: ProjectRules,

    /// Extra constraint lines, rendered after the budget lines.
    pub constraints: Vec<String>,

    /// Report instruction used when the agent spec has none.
    pub report_format: Option<String>,
}

impl PromptContext {
    pub fn new(objective: impl Into<String>) -> Self {
        Self {
            objective: objective.into(),
            rules: ProjectRules::empty(),
            constraints: vec![DEFAULT_CONSTRAINT.to_string()],
            report_format: None,
        }
    }

    pub fn with_rules(mut self, rules: ProjectRules) -> Self {
        self.rules = rules;
        self
    }

    /// Replace the constraint templates.
    pub fn with_constraints(mut self, constraints: Vec<String>) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_report_format(mut self, format: impl Into<String>) -> Self {
        self.report_format = Some(format.into());
        self
    }
}

/// Where an orchestrator looks for project rules on each invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulesSource {
    pub root: PathBuf,
    pub layout: RulesLayout,
    pub instructions: Vec<String>,
}

impl RulesSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            layout: RulesLayout::default(),
            instructions: Vec::new(),
        }
    }

    pub fn layout(mut self, layout: RulesLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn instructions(mut self, instructions: Vec<String>) -> Self {
        self.instructions = instructions;
        self
    }

    /// Read the rules fresh from disk.
    pub fn load(&self) -> ProjectRules {
        ProjectRules::discover(&self.root, &self.layout, &self.instructions)
    }
}
