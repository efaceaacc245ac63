//! 事件流：生产者任务 -> 有界 mpsc 通道 -> 调用方
//!
//! EventSink 在生产者一侧保证终止事件（error / finish）之后不再发送任何事件；
//! 接收端被丢弃时取消该任务的 token，生产者在下一个挂起点退出。取消本身不关闭通道，
//! 调用方仍会收到带 cancelled 原因码的 error 事件。

use futures_util::stream::{self, Stream};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::agent::StreamEvent;
use crate::core::TaskOutcome;

/// 生产者一侧的事件出口
pub struct EventSink {
    tx: Option<mpsc::Sender<StreamEvent>>,
    cancel: CancellationToken,
    terminated: bool,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<StreamEvent>, cancel: CancellationToken) -> Self {
        Self {
            tx: Some(tx),
            cancel,
            terminated: false,
        }
    }

    /// 丢弃所有事件（非流式调用）
    pub fn discard() -> Self {
        Self {
            tx: None,
            cancel: CancellationToken::new(),
            terminated: false,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// 发送一个事件；返回是否送达。终止之后的事件一律拒绝。
    pub async fn emit(&mut self, event: StreamEvent) -> bool {
        if self.terminated {
            tracing::warn!(kind = event.kind(), "Event after terminal event dropped");
            return false;
        }
        if event.is_terminal() {
            self.terminated = true;
        }
        tracing::debug!(kind = event.kind(), "stream event");

        let Some(tx) = &self.tx else {
            return false;
        };
        // 只在接收端关闭时停止投递；任务被取消后仍要送出终止事件
        let sent = tx.send(event).await.is_ok();
        if !sent {
            tracing::info!("Stream consumer gone, cancelling task");
            self.tx = None;
            self.cancel.cancel();
        }
        sent
    }
}

/// 调用方持有的任务流
pub struct TaskStream {
    rx: mpsc::Receiver<StreamEvent>,
    cancel: CancellationToken,
    handle: JoinHandle<TaskOutcome>,
}

impl TaskStream {
    pub fn new(
        rx: mpsc::Receiver<StreamEvent>,
        cancel: CancellationToken,
        handle: JoinHandle<TaskOutcome>,
    ) -> Self {
        Self { rx, cancel, handle }
    }

    /// 下一个事件；生产者结束后返回 None
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }

    /// 请求取消；已发出的事件仍可继续读取
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 转为 futures Stream；放弃 TaskOutcome，生产者照常运行到结束
    pub fn into_stream(self) -> impl Stream<Item = StreamEvent> + Send + 'static {
        stream::unfold(self.rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
    }

    /// 读完剩余事件并等待任务结果
    pub async fn join(self) -> Result<TaskOutcome, JoinError> {
        self.collect().await.map(|(_, outcome)| outcome)
    }

    /// 读完所有事件，连同任务结果一起返回
    pub async fn collect(mut self) -> Result<(Vec<StreamEvent>, TaskOutcome), JoinError> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            events.push(event);
        }
        let outcome = self.handle.await?;
        Ok((events, outcome))
    }
}
