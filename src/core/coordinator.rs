//! TaskCoordinator：Planning -> Executing[i] -> Completed | Aborted
//!
//! 严格顺序执行步骤，任何一步失败立即中止（不重试）。任务结束（完成或中止）时先追加会话历史，
//! 再发送终止事件；未生成计划时只发 content 事件，不写历史。

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::agent::{
    ExecutionHistoryEntry, Plan, PlanDecode, Planner, StepExecutor, StepResult, StepResults,
    StepStatus, StreamEvent, ToolCallBudget, DEFAULT_ACT_PROMPT, DEFAULT_PLAN_PROMPT,
};
use crate::config::{load_prompt, AppConfig};
use crate::core::stream::{EventSink, TaskStream};
use crate::core::{AbortCode, SessionSupervisor};
use crate::llm::create_llm_from_config;
use crate::session::SessionStore;
use crate::tools::{ToolExecutor, ToolRegistry};

/// 规划开始时发出的提示
pub const PLANNING_NOTICE: &str = "start to generate plans...";

/// 任务所处阶段（日志用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    Planning,
    /// 正在执行第 i 步（0-based）
    Executing(usize),
    Completed,
    Aborted,
    NoPlan,
}

/// 一次任务运行的最终结果
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// 规划输出中没有可执行的计划，raw 为 LLM 原文
    NoPlan { raw: String },
    /// 规划调用本身失败（LLM 错误、超时、取消）
    PlanFailed { reason: String, code: AbortCode },
    Completed { plan: Plan, results: StepResults },
    /// 在 step（1-based）中止
    Aborted {
        plan: Plan,
        results: StepResults,
        step: usize,
        code: AbortCode,
        reason: String,
    },
}

impl TaskOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskOutcome::Completed { .. })
    }

    pub fn plan(&self) -> Option<&Plan> {
        match self {
            TaskOutcome::Completed { plan, .. } | TaskOutcome::Aborted { plan, .. } => Some(plan),
            _ => None,
        }
    }

    pub fn results(&self) -> Option<&StepResults> {
        match self {
            TaskOutcome::Completed { results, .. } | TaskOutcome::Aborted { results, .. } => {
                Some(results)
            }
            _ => None,
        }
    }
}

pub struct TaskCoordinator {
    planner: Planner,
    executor: StepExecutor,
    store: Arc<dyn SessionStore>,
    supervisor: SessionSupervisor,
    tool_call_limit: usize,
    event_buffer: usize,
}

impl TaskCoordinator {
    pub fn new(planner: Planner, executor: StepExecutor, store: Arc<dyn SessionStore>) -> Self {
        Self {
            planner,
            executor,
            store,
            supervisor: SessionSupervisor::new(),
            tool_call_limit: 15,
            event_buffer: 32,
        }
    }

    /// 按配置组装：plan / act 各自的 LLM、prompt 文件、工具超时与通道容量
    pub fn from_config(cfg: &AppConfig, tools: ToolRegistry, store: Arc<dyn SessionStore>) -> Self {
        let plan_prompt = format!(
            "{}\n\n## Available tools\n{}",
            load_prompt(cfg, "plan", DEFAULT_PLAN_PROMPT),
            tools.describe_for_prompt()
        );
        let planner = Planner::new(
            create_llm_from_config(&cfg.plan.llm),
            plan_prompt,
            store.clone(),
            cfg.plan.history_messages,
        )
        .with_timeout_secs(cfg.plan.timeout_secs);

        let act_prompt = load_prompt(cfg, "act", DEFAULT_ACT_PROMPT);
        let executor = StepExecutor::new(
            create_llm_from_config(&cfg.act.llm),
            ToolExecutor::new(tools, cfg.tools.tool_timeout_secs),
            &act_prompt,
        )
        .with_timeout_secs(cfg.act.step_timeout_secs);

        Self::new(planner, executor, store)
            .with_tool_call_limit(cfg.act.tool_call_limit)
            .with_event_buffer(cfg.stream.event_buffer)
    }

    pub fn with_tool_call_limit(mut self, limit: usize) -> Self {
        self.tool_call_limit = limit;
        self
    }

    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }

    pub fn supervisor(&self) -> &SessionSupervisor {
        &self.supervisor
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// 非流式执行：事件丢弃，只返回结果
    pub async fn execute_task(&self, session_id: &str, user_request: &str) -> TaskOutcome {
        let cancel = self.supervisor.child_token();
        let mut sink = EventSink::discard();
        self.run(session_id, user_request, &mut sink, &cancel).await
    }

    /// 流式执行：在独立 tokio 任务中运行，事件经有界通道送给调用方
    pub fn execute_task_stream(
        self: &Arc<Self>,
        session_id: impl Into<String>,
        user_request: impl Into<String>,
    ) -> TaskStream {
        let session_id = session_id.into();
        let user_request = user_request.into();
        let (tx, rx) = mpsc::channel(self.event_buffer);
        let cancel = self.supervisor.child_token();
        let mut sink = EventSink::new(tx, cancel.clone());
        let this = Arc::clone(self);
        let task_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            this.run(&session_id, &user_request, &mut sink, &task_cancel)
                .await
        });
        TaskStream::new(rx, cancel, handle)
    }

    /// 驱动一次任务的状态机
    pub async fn run(
        &self,
        session_id: &str,
        user_request: &str,
        sink: &mut EventSink,
        cancel: &CancellationToken,
    ) -> TaskOutcome {
        let mut phase = TaskPhase::Planning;
        tracing::info!(session_id, ?phase, "Task started");
        sink.emit(StreamEvent::content(PLANNING_NOTICE)).await;

        let mut plan = match self.planner.generate_plan(session_id, user_request, cancel).await {
            Ok(PlanDecode::Plan(plan)) => plan,
            Ok(PlanDecode::Unstructured(raw)) => {
                phase = TaskPhase::NoPlan;
                tracing::warn!(session_id, ?phase, "No valid plan generated");
                sink.emit(StreamEvent::content(format!("no valid plan generated.\n{raw}")))
                    .await;
                return TaskOutcome::NoPlan { raw };
            }
            Err(e) => {
                let code = e.plan_abort_code();
                let reason = format!("Error generating plan: {e}");
                tracing::error!(session_id, ?code, "{}", reason);
                sink.emit(StreamEvent::Error {
                    content: reason.clone(),
                    code,
                })
                .await;
                return TaskOutcome::PlanFailed { reason, code };
            }
        };

        sink.emit(StreamEvent::todo_progress(&plan)).await;

        let mut results = StepResults::new();
        let mut budget = ToolCallBudget::new(self.tool_call_limit);

        for i in 0..plan.len() {
            phase = TaskPhase::Executing(i);
            let step = plan.steps[i].clone();
            let number = step.number();
            tracing::info!(session_id, ?phase, tool = %step.tool.name, "Executing step {}", number);
            sink.emit(StreamEvent::ToolStart {
                tool: step.tool.name.clone(),
                step: number,
            })
            .await;

            let executed = self
                .executor
                .execute_step(&step, user_request, &plan, &results, &mut budget, cancel)
                .await;

            let (code, reason) = match executed {
                Ok(result) => {
                    results.insert(number, result.clone());
                    let status = settle(&mut plan, i, &result);
                    let failure = (status != StepStatus::Success).then(|| {
                        let message = result
                            .message
                            .clone()
                            .unwrap_or_else(|| result.output_text());
                        format!("Task failed at step {number}: {message}")
                    });
                    sink.emit(StreamEvent::ToolEnd {
                        result,
                        step: number,
                    })
                    .await;
                    match failure {
                        None => continue,
                        Some(reason) => (AbortCode::StepFailed, reason),
                    }
                }
                Err(e) => {
                    let diagnostic = e.to_string();
                    let failed = StepResult::failed(diagnostic.clone());
                    results.insert(number, failed.clone());
                    settle(&mut plan, i, &failed);
                    (e.abort_code(), format!("Error executing step {number}\n {diagnostic}"))
                }
            };

            phase = TaskPhase::Aborted;
            tracing::error!(session_id, ?phase, ?code, step = number, "{}", reason);
            self.record(session_id, &plan, &results).await;
            sink.emit(StreamEvent::Error {
                content: reason.clone(),
                code,
            })
            .await;
            return TaskOutcome::Aborted {
                plan,
                results,
                step: number,
                code,
                reason,
            };
        }

        phase = TaskPhase::Completed;
        tracing::info!(session_id, ?phase, steps = plan.len(), "Task completed");
        self.record(session_id, &plan, &results).await;
        sink.emit(StreamEvent::Finish {
            session_id: session_id.to_string(),
        })
        .await;
        TaskOutcome::Completed { plan, results }
    }

    /// 追加执行历史；写失败只记日志
    async fn record(&self, session_id: &str, plan: &Plan, results: &StepResults) {
        let entry = ExecutionHistoryEntry::new(plan.clone(), results.clone());
        if let Err(e) = self.store.append(session_id, entry).await {
            tracing::warn!(session_id, "Failed to append execution history: {}", e);
        }
    }
}

/// 写回步骤状态；只有索引越界或重复结算才会失败，此时按失败处理
fn settle(plan: &mut Plan, index: usize, result: &StepResult) -> StepStatus {
    plan.update_step(index, Some(result)).unwrap_or_else(|e| {
        tracing::error!("Failed to update step {}: {}", index + 1, e);
        StepStatus::Failed
    })
}
