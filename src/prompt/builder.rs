// ABOUTME: PromptBuilder - composes the tagged ROLE/OBJECTIVE/PROJECT_RULES/
// ABOUTME: CONSTRAINTS/REPORT_FORMAT prompt from a spec and a context.

use super::{DEFAULT_REPORT_FORMAT, PromptContext};
use crate::agent::AgentSpec;

/// Compose the prompt for one invocation.
///
/// Pure: reads nothing but its arguments, so identical inputs always yield
/// byte-identical text.
pub fn build(spec: &AgentSpec, context: &PromptContext) -> String {
    let report_format = spec
        .report_format
        .as_deref()
        .or(context.report_format.as_deref())
        .unwrap_or(DEFAULT_REPORT_FORMAT);

    let mut prompt = String::new();
    push_section(&mut prompt, "ROLE", &role(spec));
    push_section(&mut prompt, "OBJECTIVE", context.objective.trim());
    push_section(&mut prompt, "PROJECT_RULES", &context.rules.render());
    push_section(&mut prompt, "CONSTRAINTS", &constraints(spec, context));
    push_section(&mut prompt, "REPORT_FORMAT", report_format.trim());
    prompt
}

fn push_section(prompt: &mut String, tag: &str, body: &str) {
    if !prompt.is_empty() {
        prompt.push('\n');
    }
    prompt.push_str(&format!("<{tag}>\n{body}\n</{tag}>\n"));
}

fn role(spec: &AgentSpec) -> String {
    let mut role = spec
        .prompt_sections
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    if let Some(description) = spec.description.as_deref().map(str::trim) {
        if !description.is_empty() {
            if !role.is_empty() {
                role.push_str("\n\n");
            }
            role.push_str(description);
        }
    }

    if role.is_empty() {
        role = format!("You are the {} agent.", spec.name);
    }
    role
}

fn constraints(spec: &AgentSpec, context: &PromptContext) -> String {
    let mut lines = spec.budgets.describe_constraints();
    if lines.is_empty() {
        lines.push("Budget: unbounded.".to_string());
    }
    lines.extend(
        context
            .constraints
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty()),
    );
    lines
        .iter()
        .map(|line| format!("- {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}
