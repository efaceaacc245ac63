//! 任务流集成测试：脚本化 LLM 驱动完整的 plan -> act -> stream 流程

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use plan_act::agent::{
    ExecutionHistoryEntry, Planner, StepExecutor, StepStatus, StreamEvent, DEFAULT_ACT_PROMPT,
    DEFAULT_PLAN_PROMPT,
};
use plan_act::core::{AbortCode, AgentError, TaskCoordinator, TaskOutcome};
use plan_act::llm::{LlmClient, LlmError, ScriptedLlmClient};
use plan_act::memory::Message;
use plan_act::session::{MemorySessionStore, SessionStore};
use plan_act::tools::{EchoTool, Tool, ToolExecutor, ToolRegistry};

struct AudioGenTool;

#[async_trait]
impl Tool for AudioGenTool {
    fn name(&self) -> &str {
        "audio_gen"
    }

    fn description(&self) -> &str {
        "Generate a soundtrack for a video clip."
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let video = args.get("video").and_then(|v| v.as_str()).unwrap_or("clip.mp4");
        Ok(json!({"success": true, "output_path": "results/audio_x.wav", "source": video}).to_string())
    }
}

/// 永不返回的执行模型，用于在步骤进行中取消
struct HangingLlm;

#[async_trait]
impl LlmClient for HangingLlm {
    async fn complete(&self, _messages: &[Message]) -> Result<String, LlmError> {
        std::future::pending().await
    }
}

/// 读历史正常、写历史总是失败
struct ReadOnlyStore;

#[async_trait]
impl SessionStore for ReadOnlyStore {
    async fn history(&self, _: &str) -> Result<Vec<ExecutionHistoryEntry>, AgentError> {
        Ok(Vec::new())
    }

    async fn append(&self, _: &str, _: ExecutionHistoryEntry) -> Result<(), AgentError> {
        Err(AgentError::SessionStore("read-only".into()))
    }
}

fn coordinator_with(
    plan_llm: Arc<dyn LlmClient>,
    act_llm: Arc<dyn LlmClient>,
    store: Arc<dyn SessionStore>,
) -> Arc<TaskCoordinator> {
    let mut tools = ToolRegistry::new();
    tools.register(EchoTool);
    let planner = Planner::new(plan_llm, DEFAULT_PLAN_PROMPT, store.clone(), 10);
    let executor = StepExecutor::new(act_llm, ToolExecutor::new(tools, 5), DEFAULT_ACT_PROMPT);
    Arc::new(TaskCoordinator::new(planner, executor, store))
}

struct Harness {
    coordinator: Arc<TaskCoordinator>,
    store: Arc<dyn SessionStore>,
    plan_llm: Arc<ScriptedLlmClient>,
    act_llm: Arc<ScriptedLlmClient>,
}

fn harness() -> Harness {
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let plan_llm = Arc::new(ScriptedLlmClient::default());
    let act_llm = Arc::new(ScriptedLlmClient::default());

    let mut tools = ToolRegistry::new();
    tools.register(EchoTool);
    tools.register(AudioGenTool);

    let planner = Planner::new(plan_llm.clone(), DEFAULT_PLAN_PROMPT, store.clone(), 10);
    let executor = StepExecutor::new(act_llm.clone(), ToolExecutor::new(tools, 5), DEFAULT_ACT_PROMPT);
    let coordinator = Arc::new(TaskCoordinator::new(planner, executor, store.clone()).with_event_buffer(4));

    Harness {
        coordinator,
        store,
        plan_llm,
        act_llm,
    }
}

fn echo_plan(n: usize) -> String {
    let steps: Vec<Value> = (1..=n)
        .map(|i| {
            json!({
                "action_description": format!("step {i}"),
                "tool": {"name": "echo", "params": {"text": i.to_string()}},
                "status": "pending"
            })
        })
        .collect();
    let plan = json!({"execution_plan": {"overall_description": format!("{n} echoes"), "steps": steps}});
    format!("Sure.\n```json\n{plan:#}\n```")
}

fn ok_reply(i: usize) -> Result<String, LlmError> {
    Ok(json!({"success": "True", "message": "ok", "content": i.to_string()}).to_string())
}

fn kinds(events: &[StreamEvent]) -> Vec<String> {
    events
        .iter()
        .map(|e| match e {
            StreamEvent::ToolStart { step, .. } => format!("tool_start({step})"),
            StreamEvent::ToolEnd { step, .. } => format!("tool_end({step})"),
            other => other.kind().to_string(),
        })
        .collect()
}

#[tokio::test]
async fn test_abort_at_step_two_stops_the_stream() {
    let h = harness();
    h.plan_llm.push(Ok(echo_plan(3)));
    h.act_llm.push(ok_reply(1));
    h.act_llm
        .push(Ok(r#"{"success": false, "message": "render failed"}"#.to_string()));
    h.act_llm.push(ok_reply(3));

    let (events, outcome) = h
        .coordinator
        .execute_task_stream("s1", "three things")
        .collect()
        .await
        .unwrap();

    assert_eq!(
        kinds(&events),
        vec![
            "content",
            "todo_progress",
            "tool_start(1)",
            "tool_end(1)",
            "tool_start(2)",
            "tool_end(2)",
            "error"
        ]
    );
    match events.last().unwrap() {
        StreamEvent::Error { content, code } => {
            assert_eq!(content, "Task failed at step 2: render failed");
            assert_eq!(*code, AbortCode::StepFailed);
        }
        other => panic!("unexpected terminal event {other:?}"),
    }
    // 第 3 步从未执行
    assert_eq!(h.act_llm.remaining(), 1);

    let TaskOutcome::Aborted { results, step, .. } = outcome else {
        panic!("expected abort");
    };
    assert_eq!(step, 2);
    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn test_all_steps_succeed_ends_with_finish() {
    let h = harness();
    h.plan_llm.push(Ok(echo_plan(3)));
    for i in 1..=3 {
        h.act_llm.push(ok_reply(i));
    }

    let (events, outcome) = h
        .coordinator
        .execute_task_stream("s1", "three things")
        .collect()
        .await
        .unwrap();

    match &events[1] {
        StreamEvent::TodoProgress { items, overall_description } => {
            assert_eq!(items.len(), 3);
            assert_eq!(overall_description, "3 echoes");
        }
        other => panic!("expected todo_progress, got {other:?}"),
    }
    assert_eq!(
        events.last(),
        Some(&StreamEvent::Finish {
            session_id: "s1".into()
        })
    );
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);

    let TaskOutcome::Completed { plan, results } = outcome else {
        panic!("expected completion");
    };
    assert_eq!(plan.len(), 3);
    assert_eq!(results.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_history_keeps_both_tasks_in_order() {
    let h = harness();
    h.plan_llm.push(Ok(echo_plan(2)));
    h.act_llm.push(Ok(r#"{"success": false, "message": "nope"}"#.to_string()));
    h.plan_llm.push(Ok(echo_plan(1)));
    h.act_llm.push(ok_reply(1));

    let first = h.coordinator.execute_task("s1", "first").await;
    assert!(matches!(first, TaskOutcome::Aborted { step: 1, .. }));
    let second = h.coordinator.execute_task("s1", "second").await;
    assert!(second.is_completed());

    let history = h.store.history("s1").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].plan.overall_description, "2 echoes");
    assert_eq!(history[1].plan.overall_description, "1 echoes");
    for entry in &history {
        assert!(entry.results.len() <= entry.plan.len());
    }

    // 第二次规划能看到第一次的结果
    let plan_calls = h.plan_llm.calls();
    let second_plan_ctx = &plan_calls[1].last().unwrap().content;
    assert!(second_plan_ctx.contains("### Previous Execution Results"));
    assert!(second_plan_ctx.contains("nope"));
}

#[tokio::test]
async fn test_single_step_audio_scenario() {
    let h = harness();
    h.plan_llm.push(Ok(json!({"execution_plan": {
        "overall_description": "Generate audio for the clip",
        "steps": [{
            "action_description": "generate audio",
            "tool": {"name": "audio_gen", "params": {"video": "clip.mp4"}},
            "status": "pending"
        }]
    }})
    .to_string()));
    h.act_llm
        .push(Ok(r#"{"tool": "audio_gen", "args": {"video": "clip.mp4"}}"#.to_string()));
    h.act_llm.push(Ok(
        "```json\n{\"success\": true, \"output_path\": \"results/audio_x.wav\"}\n```".to_string(),
    ));

    let (events, outcome) = h
        .coordinator
        .execute_task_stream("s-audio", "generate audio for clip.mp4")
        .collect()
        .await
        .unwrap();

    assert_eq!(
        kinds(&events),
        vec!["content", "todo_progress", "tool_start(1)", "tool_end(1)", "finish"]
    );
    assert_eq!(events[0], StreamEvent::content("start to generate plans..."));
    assert!(matches!(&events[2], StreamEvent::ToolStart { tool, .. } if tool == "audio_gen"));
    match &events[3] {
        StreamEvent::ToolEnd { result, .. } => {
            assert!(result.success);
            assert_eq!(result.output_text(), "results/audio_x.wav");
        }
        other => panic!("expected tool_end, got {other:?}"),
    }
    let plan = outcome.plan().unwrap();
    assert_eq!(plan.steps[0].output.as_deref(), Some("results/audio_x.wav"));
}

#[tokio::test]
async fn test_no_plan_is_content_then_silence() {
    let h = harness();
    h.plan_llm.push(Ok("Hello! What would you like to make?".to_string()));

    let (events, outcome) = h
        .coordinator
        .execute_task_stream("s1", "hi")
        .collect()
        .await
        .unwrap();

    assert_eq!(
        events,
        vec![
            StreamEvent::content("start to generate plans..."),
            StreamEvent::content("no valid plan generated.\nHello! What would you like to make?"),
        ]
    );
    assert!(matches!(outcome, TaskOutcome::NoPlan { .. }));
    assert!(h.store.history("s1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_raised_step_error_has_no_tool_end() {
    let h = harness();
    h.plan_llm.push(Ok(echo_plan(2)));
    h.act_llm
        .push(Ok(r#"{"tool": "does_not_exist", "args": {}}"#.to_string()));

    let (events, outcome) = h
        .coordinator
        .execute_task_stream("s1", "x")
        .collect()
        .await
        .unwrap();

    assert_eq!(
        kinds(&events),
        vec!["content", "todo_progress", "tool_start(1)", "error"]
    );
    match events.last().unwrap() {
        StreamEvent::Error { content, code } => {
            assert!(content.starts_with("Error executing step 1\n"));
            assert!(content.contains("does_not_exist"));
            assert_eq!(*code, AbortCode::StepError);
        }
        other => panic!("unexpected terminal event {other:?}"),
    }
    let results = outcome.results().unwrap();
    assert_eq!(results.len(), 1);
    assert!(!results[&1].success);
    assert_eq!(h.store.history("s1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_cancel_aborts_with_cancelled_code() {
    let h = harness();
    h.plan_llm.push(Ok(echo_plan(2)));

    let stream = h.coordinator.execute_task_stream("s1", "x");
    stream.cancel();
    let outcome = stream.join().await.unwrap();

    let code = match outcome {
        TaskOutcome::PlanFailed { code, .. } | TaskOutcome::Aborted { code, .. } => code,
        other => panic!("expected cancellation, got {other:?}"),
    };
    assert_eq!(code, AbortCode::Cancelled);
}

#[tokio::test]
async fn test_cancel_mid_step_ends_with_cancelled_error() {
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let coordinator = coordinator_with(
        Arc::new(ScriptedLlmClient::new([echo_plan(1)])),
        Arc::new(HangingLlm),
        store.clone(),
    );

    let mut stream = coordinator.execute_task_stream("s1", "x");
    let mut events = Vec::new();
    while let Some(event) = stream.recv().await {
        let started = matches!(event, StreamEvent::ToolStart { .. });
        events.push(event);
        if started {
            break;
        }
    }
    stream.cancel();
    let (rest, outcome) = stream.collect().await.unwrap();
    events.extend(rest);

    assert_eq!(
        kinds(&events),
        vec!["content", "todo_progress", "tool_start(1)", "error"]
    );
    assert!(matches!(
        events.last(),
        Some(StreamEvent::Error { code: AbortCode::Cancelled, .. })
    ));
    assert!(matches!(
        outcome,
        TaskOutcome::Aborted { step: 1, code: AbortCode::Cancelled, .. }
    ));
    assert_eq!(store.history("s1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_off_type_optional_fields_do_not_fail_a_successful_step() {
    let h = harness();
    h.plan_llm.push(Ok(echo_plan(1)));
    h.act_llm.push(Ok(
        r#"{"success": true, "message": 200, "output_path": "results/a.wav"}"#.to_string(),
    ));

    let outcome = h.coordinator.execute_task("s1", "x").await;
    assert!(outcome.is_completed());
    let plan = outcome.plan().unwrap();
    assert_eq!(plan.steps[0].status, StepStatus::Success);
    assert_eq!(plan.steps[0].output.as_deref(), Some("results/a.wav"));
    assert_eq!(outcome.results().unwrap()[&1].message.as_deref(), Some("200"));
}

#[tokio::test]
async fn test_history_write_failure_keeps_finish_event() {
    let act = Arc::new(ScriptedLlmClient::default());
    act.push(ok_reply(1));
    let coordinator = coordinator_with(
        Arc::new(ScriptedLlmClient::new([echo_plan(1)])),
        act,
        Arc::new(ReadOnlyStore),
    );

    let (events, outcome) = coordinator
        .execute_task_stream("s1", "x")
        .collect()
        .await
        .unwrap();
    assert_eq!(
        kinds(&events),
        vec!["content", "todo_progress", "tool_start(1)", "tool_end(1)", "finish"]
    );
    assert!(outcome.is_completed());
}

#[tokio::test]
async fn test_history_write_failure_keeps_error_event() {
    let act = Arc::new(ScriptedLlmClient::new([r#"{"success": false, "message": "bad input"}"#]));
    let coordinator = coordinator_with(
        Arc::new(ScriptedLlmClient::new([echo_plan(2)])),
        act,
        Arc::new(ReadOnlyStore),
    );

    let (events, outcome) = coordinator
        .execute_task_stream("s1", "x")
        .collect()
        .await
        .unwrap();
    assert_eq!(
        kinds(&events),
        vec!["content", "todo_progress", "tool_start(1)", "tool_end(1)", "error"]
    );
    match events.last().unwrap() {
        StreamEvent::Error { content, code } => {
            assert_eq!(content, "Task failed at step 1: bad input");
            assert_eq!(*code, AbortCode::StepFailed);
        }
        other => panic!("unexpected terminal event {other:?}"),
    }
    assert!(matches!(
        outcome,
        TaskOutcome::Aborted { step: 1, code: AbortCode::StepFailed, .. }
    ));
}
