//! 会话监管：任务取消令牌
//!
//! 持有根 CancellationToken；每个任务运行拿一个子 token，关闭时取消根 token 即可中止全部进行中的任务。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct SessionSupervisor {
    cancel_token: CancellationToken,
    started: Arc<AtomicUsize>,
}

impl SessionSupervisor {
    pub fn new() -> Self {
        Self {
            cancel_token: CancellationToken::new(),
            started: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// 为单个任务创建子 token；取消子 token 不影响其它任务
    pub fn child_token(&self) -> CancellationToken {
        self.started.fetch_add(1, Ordering::Relaxed);
        self.cancel_token.child_token()
    }

    /// 取消所有进行中的任务（进程关闭时）
    pub fn cancel_all(&self) {
        tracing::info!("Cancelling all running tasks");
        self.cancel_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// 已发放的任务 token 数
    pub fn tasks_started(&self) -> usize {
        self.started.load(Ordering::Relaxed)
    }
}

impl Default for SessionSupervisor {
    fn default() -> Self {
        Self::new()
    }
}
