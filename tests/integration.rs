// ABOUTME: Integration tests verifying modules work together.
// ABOUTME: Drives the orchestrator end to end with scripted model clients.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use delegate::prelude::*;
use futures::StreamExt;
use tokio::sync::Semaphore;

/// A test tool for integration testing.
struct GreetTool;

#[async_trait::async_trait]
impl Tool for GreetTool {
    fn name(&self) -> &str {
        "greet"
    }

    fn description(&self) -> &str {
        "Greet a person by name"
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "The name to greet"
                }
            },
            "required": ["name"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolResult, anyhow::Error> {
        let name = params["name"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing name parameter"))?;
        Ok(ToolResult::text(format!("Hello, {}!", name)))
    }
}

struct NamedTool(&'static str);

#[async_trait::async_trait]
impl Tool for NamedTool {
    fn name(&self) -> &str {
        self.0
    }

    fn description(&self) -> &str {
        "A placeholder tool"
    }

    async fn execute(&self, _params: serde_json::Value) -> Result<ToolResult, anyhow::Error> {
        Ok(ToolResult::text("ok"))
    }
}

fn registry() -> Registry {
    let registry = Registry::new();
    registry.register(GreetTool);
    registry.register(NamedTool("read"));
    registry.register(NamedTool("edit"));
    registry.register(NamedTool("bash"));
    registry
}

/// Records what each invocation saw, optionally holding calls until released.
#[derive(Default)]
struct RecordingModel {
    gate: Option<Arc<Semaphore>>,
    seen: Mutex<Vec<(ModelHandle, Vec<String>)>>,
}

#[async_trait::async_trait]
impl ModelClient for RecordingModel {
    async fn invoke(
        &self,
        model: &ModelHandle,
        _prompt: &str,
        scope: &InvocationScope,
        _budget: &Budgets,
    ) -> Result<ModelResponse, ModelError> {
        let tools = scope
            .tool_definitions()
            .into_iter()
            .map(|d| d.name)
            .collect();
        self.seen.lock().unwrap().push((model.clone(), tools));

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let greeting = if scope.tools().contains("greet") {
            scope
                .invoke_tool("greet", serde_json::json!({"name": "parent"}))
                .await
                .map(|r| {
                    assert_eq!(r.metadata.get("run_id"), Some(&serde_json::json!(scope.run_id())));
                    r.content
                })
                .map_err(|e| ModelError::Other(e.into()))?
        } else {
            "no greeting".to_string()
        };

        Ok(ModelResponse::text(
            format!("{}\n```json\n{{\"ok\": true}}\n```", greeting),
            Usage::new(100, 20),
        ))
    }
}

#[tokio::test]
async fn test_inherit_snapshots_parent_at_spawn() {
    let gate = Arc::new(Semaphore::new(0));
    let model = Arc::new(RecordingModel {
        gate: Some(gate.clone()),
        ..Default::default()
    });
    let orchestrator = SubagentOrchestrator::builder(model.clone())
        .tools(Arc::new(registry()))
        .build();
    orchestrator.register_session(
        "parent",
        ParentSnapshot::new("sonnet", registry().list()),
    );

    let handles: Vec<RunHandle> = (0..3)
        .map(|i| {
            orchestrator
                .spawn_subagent("parent", "general", format!("task {i}"), None)
                .unwrap()
        })
        .collect();

    // The parent switches model and loses tools right after spawning.
    orchestrator.set_session_model("parent", "haiku").unwrap();
    orchestrator
        .set_session_tools("parent", ToolSet::new())
        .unwrap();
    gate.add_permits(3);

    for handle in &handles {
        let state = handle.wait_with_timeout(Duration::from_secs(5)).await.unwrap();
        let summary = state.summary().expect("completed");
        assert_eq!(summary.text.lines().next(), Some("Hello, parent!"));
        assert_eq!(summary.artifact, Some(serde_json::json!({"ok": true})));
        assert_eq!(summary.usage.tool_calls, 1);
    }

    let seen = model.seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    for (model, tools) in seen.iter() {
        assert_eq!(model, &ModelHandle::new("sonnet"));
        assert_eq!(tools, &vec!["bash", "edit", "greet", "read"]);
    }
}

#[tokio::test]
async fn test_runtime_deny_over_project_allow() {
    let project = tempfile::TempDir::new().unwrap();
    std::fs::create_dir_all(project.path().join(".delegate")).unwrap();
    std::fs::write(
        project.path().join(".delegate/agents.json"),
        r#"{"reviewer": {
            "mode": "subagent",
            "prompt": "Review the change for bugs.",
            "tools": {"mode": "allow", "names": ["bash", "edit", "greet", "read"]}
        }}"#,
    )
    .unwrap();

    let tools = registry();
    let layers = ConfigLoader::discover(
        Some(project.path()),
        None,
        Some(r#"{"reviewer": {"tools": {"mode": "deny", "names": ["edit"]}}}"#),
    )
    .unwrap();
    let agents = AgentRegistry::build(&layers, &tools).unwrap();

    let reviewer = agents.get("reviewer").unwrap();
    assert_eq!(reviewer.tools, ToolPolicy::DenyList(vec!["edit".into()]));
    assert_eq!(reviewer.prompt_sections, vec!["Review the change for bugs."]);
    assert_eq!(reviewer.layer, Layer::Runtime);

    let model = Arc::new(RecordingModel::default());
    let orchestrator = SubagentOrchestrator::builder(model.clone())
        .agents(agents)
        .tools(Arc::new(tools.clone()))
        .build();
    orchestrator.register_session("parent", ParentSnapshot::new("sonnet", tools.list()));

    let handle = orchestrator
        .spawn_subagent("parent", "reviewer", "Review src/lib.rs", None)
        .unwrap();
    handle.wait().await;

    let status = orchestrator.get_run_status(handle.run_id()).unwrap();
    assert_eq!(status.tools, vec!["bash", "greet", "read"]);
    assert_eq!(
        model.seen.lock().unwrap()[0].1,
        vec!["bash", "greet", "read"]
    );
}

#[tokio::test]
async fn test_session_event_stream() {
    let model = Arc::new(RecordingModel::default());
    let orchestrator = SubagentOrchestrator::builder(model)
        .tools(Arc::new(registry()))
        .build();
    orchestrator.register_session("parent", ParentSnapshot::new("sonnet", ToolSet::new()));
    orchestrator.register_session("other", ParentSnapshot::new("sonnet", ToolSet::new()));

    let events = orchestrator.subscribe("parent").into_stream();
    let first = orchestrator
        .spawn_subagent("parent", "general", "one", None)
        .unwrap();
    let second = orchestrator
        .spawn_subagent("parent", "general", "two", None)
        .unwrap();
    let unrelated = orchestrator
        .spawn_subagent("other", "general", "three", None)
        .unwrap();

    let collected: Vec<LifecycleEvent> = tokio::time::timeout(
        Duration::from_secs(5),
        events
            .scan(0, |terminal, event| {
                if event.kind.is_terminal() {
                    *terminal += 1;
                }
                let done = *terminal >= 2 && event.kind.is_terminal();
                futures::future::ready(Some((event, done)))
            })
            .take_while(|(_, done)| futures::future::ready(!*done))
            .map(|(event, _)| event)
            .collect(),
    )
    .await
    .unwrap();
    unrelated.wait().await;

    assert!(collected.iter().all(|e| e.parent_session_id == "parent"));
    for handle in [&first, &second] {
        let kinds: Vec<&str> = collected
            .iter()
            .filter(|e| e.run_id == handle.run_id())
            .map(|e| e.kind.name())
            .collect();
        assert_eq!(kinds.first(), Some(&"started"));
    }

    let json = serde_json::to_value(&collected[0]).unwrap();
    assert_eq!(json["kind"], "started");
    assert_eq!(json["parent_session_id"], "parent");
}

#[tokio::test]
async fn test_config_errors_surface_before_any_run() {
    let err = ConfigLayer::from_json(
        Layer::Runtime,
        "runtime",
        r#"{"reviewer": {"tools": {"mode": "allow", "names": ["edit"]}, "colour": "red"}}"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("reviewer"));

    let layer = ConfigLayer::from_json(
        Layer::Runtime,
        "runtime",
        r#"{"reviewer": {"tools": {"mode": "allow", "names": ["deploy"]}}}"#,
    )
    .unwrap();
    let err = AgentRegistry::build(&[layer], &registry()).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidReference { .. }));
}
