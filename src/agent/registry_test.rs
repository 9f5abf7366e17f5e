// ABOUTME: Tests for AgentRegistry - building, lookup, modes, and inline specs.
// ABOUTME: Uses an in-memory tool registry with mock tools.

use super::*;
use crate::config::{ConfigLayer, PartialAgentSpec, ToolsDefinition, ToolsMode};
use crate::error::ConfigError;
use crate::tool::{Registry, Tool, ToolResult};

struct MockTool {
    name: &'static str,
}

#[async_trait::async_trait]
impl Tool for MockTool {
    fn name(&self) -> &str {
        self.name
    }
    fn description(&self) -> &str {
        "A mock tool"
    }
    async fn execute(&self, _params: serde_json::Value) -> Result<ToolResult, anyhow::Error> {
        Ok(ToolResult::text("ok"))
    }
}

fn tools() -> Registry {
    let registry = Registry::new();
    registry.register(MockTool { name: "read" });
    registry.register(MockTool { name: "edit" });
    registry
}

#[test]
fn test_builtin_registry() {
    let registry = AgentRegistry::builtin();
    assert_eq!(registry.names(), vec!["general", "primary"]);
    assert_eq!(registry.get("primary").unwrap().mode, AgentMode::Primary);
}

#[test]
fn test_build_includes_builtins_and_layers() {
    let runtime = ConfigLayer::from_json(
        Layer::Runtime,
        "runtime",
        r#"{"reviewer": {"mode": "subagent", "prompt": ["Review carefully."]}}"#,
    )
    .unwrap();

    let registry = AgentRegistry::build(&[runtime], &tools()).unwrap();
    assert_eq!(registry.len(), 3);
    let reviewer = registry.get("reviewer").unwrap();
    assert_eq!(reviewer.prompt_sections, vec!["Review carefully."]);
    assert_eq!(reviewer.layer, Layer::Runtime);
}

#[test]
fn test_runtime_can_override_builtin() {
    let runtime = ConfigLayer::from_json(
        Layer::Runtime,
        "runtime",
        r#"{"general": {"model": "haiku"}}"#,
    )
    .unwrap();

    let registry = AgentRegistry::build(&[runtime], &tools()).unwrap();
    let general = registry.get("general").unwrap();
    assert_eq!(general.mode, AgentMode::Subagent);
    assert!(matches!(general.model, ModelOverride::Explicit(ref m) if m.id() == "haiku"));
}

#[test]
fn test_agents_in_mode() {
    let runtime = ConfigLayer::from_json(
        Layer::Runtime,
        "runtime",
        r#"{"helper": {}, "lead": {"mode": "primary"}}"#,
    )
    .unwrap();
    let registry = AgentRegistry::build(&[runtime], &tools()).unwrap();

    let subagents: Vec<_> = registry
        .agents_in_mode(AgentMode::Subagent)
        .iter()
        .map(|s| s.name.clone())
        .collect();
    assert_eq!(subagents, vec!["general", "helper"]);

    let primaries: Vec<_> = registry
        .agents_in_mode(AgentMode::Primary)
        .iter()
        .map(|s| s.name.clone())
        .collect();
    assert_eq!(primaries, vec!["helper", "lead", "primary"]);
}

#[test]
fn test_resolve_named() {
    let registry = AgentRegistry::builtin();
    assert!(registry.resolve(&"general".into(), &tools()).unwrap().is_some());
    assert!(registry.resolve(&"missing".into(), &tools()).unwrap().is_none());
}

#[test]
fn test_inline_overrides_registry_entry() {
    let registry = AgentRegistry::builtin();
    let inline = AgentRef::inline(
        "general",
        PartialAgentSpec {
            tools: Some(ToolsDefinition {
                mode: ToolsMode::Deny,
                names: vec!["edit".into()],
            }),
            ..Default::default()
        },
    );

    let spec = registry.resolve(&inline, &tools()).unwrap().unwrap();
    assert_eq!(spec.tools, ToolPolicy::DenyList(vec!["edit".into()]));
    assert_eq!(spec.mode, AgentMode::Subagent);
    assert_eq!(spec.layer, Layer::Inline);
    // The registry entry itself is untouched.
    assert_eq!(registry.get("general").unwrap().tools, ToolPolicy::Inherit);
}

#[test]
fn test_inline_synthesizes_unknown_agent() {
    let registry = AgentRegistry::builtin();
    let inline = AgentRef::inline(
        "scratch",
        PartialAgentSpec {
            prompt: Some(vec!["Summarize the diff.".into()]),
            ..Default::default()
        },
    );

    let spec = registry.resolve(&inline, &tools()).unwrap().unwrap();
    assert_eq!(spec.name, "scratch");
    assert_eq!(spec.prompt_sections, vec!["Summarize the diff."]);
}

#[test]
fn test_inline_invalid_reference() {
    let registry = AgentRegistry::builtin();
    let inline = AgentRef::inline(
        "scratch",
        PartialAgentSpec {
            tools: Some(ToolsDefinition {
                mode: ToolsMode::Allow,
                names: vec!["deploy".into()],
            }),
            ..Default::default()
        },
    );

    let err = registry.resolve(&inline, &tools()).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidReference { .. }));
}
