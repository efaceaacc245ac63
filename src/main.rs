//! plan-act 命令行入口
//!
//! 从 stdin 逐行读取任务（exit / quit 退出），整个进程使用同一个 session；
//! 每个流事件以 `data: {json}` 一行输出到 stdout，日志写 stderr。Ctrl+C 取消当前任务。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};

use plan_act::config::load_config;
use plan_act::core::{TaskCoordinator, TaskOutcome};
use plan_act::observability;
use plan_act::session::create_session_store;
use plan_act::tools::{EchoTool, ToolRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load config")?;

    let store = create_session_store(cfg.app.history_db.as_deref()).await;
    let mut tools = ToolRegistry::new();
    tools.register(EchoTool);
    let coordinator = Arc::new(TaskCoordinator::from_config(&cfg, tools, store));

    let session_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(app = %cfg.app.name, session_id = %session_id, "Ready, enter a task (exit to quit)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let request = line.trim();
        if request.is_empty() {
            continue;
        }
        if matches!(request, "exit" | "quit") {
            break;
        }

        let mut stream = coordinator.execute_task_stream(session_id.clone(), request);
        loop {
            tokio::select! {
                event = stream.recv() => match event {
                    Some(event) => println!("data: {}", event.to_json()),
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    tracing::warn!("Interrupted, cancelling task");
                    stream.cancel();
                }
            }
        }

        match stream.join().await.context("Task panicked")? {
            TaskOutcome::Completed { results, .. } => {
                tracing::info!(steps = results.len(), "Task completed")
            }
            TaskOutcome::Aborted { step, code, .. } => {
                tracing::warn!(step, ?code, "Task aborted")
            }
            TaskOutcome::NoPlan { .. } => tracing::info!("No plan for this request"),
            TaskOutcome::PlanFailed { code, .. } => tracing::warn!(?code, "Planning failed"),
        }
    }

    coordinator.supervisor().cancel_all();
    Ok(())
}
