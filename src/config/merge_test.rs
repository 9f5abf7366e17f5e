// ABOUTME: Tests for layered config parsing and merging.
// ABOUTME: Covers precedence, tool-policy replacement, prompt extension, and errors.

use std::time::Duration;

use super::*;
use crate::agent::{Layer, ModelOverride, ToolPolicy};
use crate::error::ConfigError;
use crate::model::ModelHandle;
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
    for name in ["read", "edit", "bash", "search"] {
        registry.register(MockTool { name });
    }
    registry
}

fn layer(layer: Layer, json: &str) -> ConfigLayer {
    ConfigLayer::from_json(layer, layer.to_string(), json).unwrap()
}

#[test]
fn test_runtime_field_wins_verbatim() {
    let layers = vec![
        layer(Layer::Runtime, r#"{"reviewer": {"model": "runtime-model"}}"#),
        layer(Layer::Project, r#"{"reviewer": {"model": "project-model"}}"#),
        layer(Layer::User, r#"{"reviewer": {"model": "user-model"}}"#),
    ];

    let merged = merge(&layers, &tools()).unwrap();
    let reviewer = &merged["reviewer"];
    assert_eq!(
        reviewer.model,
        ModelOverride::Explicit(ModelHandle::new("runtime-model"))
    );
    assert_eq!(reviewer.layer, Layer::Runtime);
}

#[test]
fn test_layer_order_in_input_does_not_matter() {
    let layers = vec![
        layer(Layer::User, r#"{"reviewer": {"model": "user-model"}}"#),
        layer(Layer::Runtime, r#"{"reviewer": {"model": "runtime-model"}}"#),
        layer(Layer::Project, r#"{"reviewer": {"model": "project-model"}}"#),
    ];

    let merged = merge(&layers, &tools()).unwrap();
    assert_eq!(
        merged["reviewer"].model,
        ModelOverride::Explicit(ModelHandle::new("runtime-model"))
    );
}

#[test]
fn test_lower_layer_fills_absent_fields() {
    let layers = vec![
        layer(Layer::Runtime, r#"{"reviewer": {"description": "Reviews diffs"}}"#),
        layer(
            Layer::Project,
            r#"{"reviewer": {"model": "project-model", "mode": "subagent"}}"#,
        ),
    ];

    let merged = merge(&layers, &tools()).unwrap();
    let reviewer = &merged["reviewer"];
    assert_eq!(reviewer.description.as_deref(), Some("Reviews diffs"));
    assert_eq!(
        reviewer.model,
        ModelOverride::Explicit(ModelHandle::new("project-model"))
    );
    assert_eq!(reviewer.mode, crate::agent::AgentMode::Subagent);
}

#[test]
fn test_inherit_keyword_resets_model() {
    let layers = vec![
        layer(Layer::Runtime, r#"{"coder": {"model": "inherit"}}"#),
        layer(Layer::User, r#"{"coder": {"model": "gpt-4o"}}"#),
    ];

    let merged = merge(&layers, &tools()).unwrap();
    assert_eq!(merged["coder"].model, ModelOverride::Inherit);
}

#[test]
fn test_tool_policy_replaces_without_union() {
    let layers = vec![
        layer(
            Layer::Runtime,
            r#"{"reviewer": {"tools": {"mode": "deny", "names": ["edit"]}}}"#,
        ),
        layer(
            Layer::Project,
            r#"{"reviewer": {"tools": {"mode": "allow", "names": ["read", "search"]}}}"#,
        ),
    ];

    let merged = merge(&layers, &tools()).unwrap();
    assert_eq!(
        merged["reviewer"].tools,
        ToolPolicy::DenyList(vec!["edit".into()])
    );
}

#[test]
fn test_tool_policy_falls_through() {
    let layers = vec![
        layer(Layer::Runtime, r#"{"reviewer": {"model": "m"}}"#),
        layer(
            Layer::User,
            r#"{"reviewer": {"tools": {"mode": "allow", "names": ["search", "read", "read"]}}}"#,
        ),
    ];

    let merged = merge(&layers, &tools()).unwrap();
    assert_eq!(
        merged["reviewer"].tools,
        ToolPolicy::AllowList(vec!["search".into(), "read".into()])
    );
}

#[test]
fn test_runtime_tool_names_keep_declared_order() {
    let layers = vec![layer(
        Layer::Runtime,
        r#"{"reviewer": {"tools": {"mode": "allow", "names": ["search", "edit", "read"]}}}"#,
    )];

    let merged = merge(&layers, &tools()).unwrap();
    assert_eq!(
        merged["reviewer"].tools,
        ToolPolicy::AllowList(vec!["search".into(), "edit".into(), "read".into()])
    );
}

#[test]
fn test_prompt_override_and_extend() {
    let layers = vec![
        layer(
            Layer::Runtime,
            r#"{"writer": {"prompt": ["Cite sources."], "prompt_mode": "extend"}}"#,
        ),
        layer(Layer::Project, r#"{"writer": {"prompt": "Write docs."}}"#),
        layer(Layer::User, r#"{"writer": {"prompt": ["User voice."]}}"#),
    ];

    let merged = merge(&layers, &tools()).unwrap();
    assert_eq!(
        merged["writer"].prompt_sections,
        vec!["Write docs.".to_string(), "Cite sources.".to_string()]
    );
}

#[test]
fn test_budgets_merge_per_field() {
    let layers = vec![
        layer(
            Layer::Runtime,
            r#"{"coder": {"budgets": {"max_tool_calls": 3}}}"#,
        ),
        layer(
            Layer::Project,
            r#"{"coder": {"budgets": {"max_tokens": 4000, "max_tool_calls": 10}}}"#,
        ),
        layer(
            Layer::User,
            r#"{"coder": {"budgets": {"max_duration_ms": 60000}}}"#,
        ),
    ];

    let merged = merge(&layers, &tools()).unwrap();
    let budgets = merged["coder"].budgets;
    assert_eq!(budgets.max_tokens, Some(4000));
    assert_eq!(budgets.max_tool_calls, Some(3));
    assert_eq!(budgets.max_duration, Some(Duration::from_secs(60)));
}

#[test]
fn test_malformed_document_is_parse_error() {
    let err = ConfigLayer::from_json(Layer::Runtime, "runtime", "{ not json").unwrap_err();
    assert!(matches!(err, ConfigError::Parse { agent: None, .. }));
}

#[test]
fn test_non_object_document_is_parse_error() {
    let err = ConfigLayer::from_json(Layer::Runtime, "runtime", "[1, 2]").unwrap_err();
    assert!(err.to_string().contains("expected an object"));
}

#[test]
fn test_malformed_entry_fails_whole_layer() {
    let err = ConfigLayer::from_json(
        Layer::Runtime,
        "runtime",
        r#"{"good": {"model": "m"}, "bad": {"tools": {"mode": "both", "names": []}}}"#,
    )
    .unwrap_err();

    match err {
        ConfigError::Parse {
            source_label,
            agent,
            message,
        } => {
            assert_eq!(source_label, "runtime");
            assert_eq!(agent.as_deref(), Some("bad"));
            assert!(message.contains("both"), "message was {message}");
        }
        other => panic!("Expected Parse, got {:?}", other),
    }
}

#[test]
fn test_unknown_field_rejected() {
    let err = ConfigLayer::from_json(
        Layer::Project,
        "project",
        r#"{"coder": {"temperature": 0.2}}"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("temperature"));
}

#[test]
fn test_invalid_agent_name_rejected() {
    let err = ConfigLayer::from_json(Layer::Project, "project", r#"{"bad name": {}}"#).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { agent: Some(ref a), .. } if a == "bad name"));
}

#[test]
fn test_inherit_mode_with_names_rejected() {
    let err = ConfigLayer::from_json(
        Layer::Project,
        "project",
        r#"{"coder": {"tools": {"mode": "inherit", "names": ["read"]}}}"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("tools.names"));
}

#[test]
fn test_prompt_mode_requires_prompt() {
    let err = ConfigLayer::from_json(
        Layer::Project,
        "project",
        r#"{"coder": {"prompt_mode": "extend"}}"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("prompt_mode"));
}

#[test]
fn test_unknown_tool_is_invalid_reference() {
    let layers = vec![layer(
        Layer::Runtime,
        r#"{"coder": {"tools": {"mode": "allow", "names": ["read", "deploy"]}}}"#,
    )];

    let err = merge(&layers, &tools()).unwrap_err();
    match err {
        ConfigError::InvalidReference { agent, tool } => {
            assert_eq!(agent, "coder");
            assert_eq!(tool, "deploy");
        }
        other => panic!("Expected InvalidReference, got {:?}", other),
    }
}

#[test]
fn test_same_rank_sources_conflict() {
    let layers = vec![
        ConfigLayer::from_json(Layer::Project, "a.json", r#"{"coder": {}}"#).unwrap(),
        ConfigLayer::from_json(Layer::Project, "b.json", r#"{"coder": {}}"#).unwrap(),
    ];

    let err = merge(&layers, &tools()).unwrap_err();
    assert!(matches!(err, ConfigError::Conflict { ref agent, .. } if agent == "coder"));
}

#[test]
fn test_builtin_layer_defines_defaults() {
    let merged = merge(&[builtin_layer()], &tools()).unwrap();
    assert!(merged.contains_key(PRIMARY_AGENT));
    assert!(merged.contains_key(GENERAL_AGENT));
    assert_eq!(merged[GENERAL_AGENT].tools, ToolPolicy::Inherit);
    assert!(merged[GENERAL_AGENT].budgets.is_unbounded());
}
