//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock / Scripted）

pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use openai::OpenAiClient;
pub use traits::{LlmClient, LlmError};

use crate::config::ModelSection;
use crate::core::AgentError;
use crate::memory::Message;

/// 根据模型段配置选择后端：api_key_env 指向的环境变量存在时走 OpenAI 兼容端点，否则退回 Mock
pub fn create_llm_from_config(section: &ModelSection) -> Arc<dyn LlmClient> {
    let provider = section.provider.to_lowercase();
    let api_key = std::env::var(&section.api_key_env).ok();

    match (provider.as_str(), api_key) {
        ("mock", _) => {
            tracing::info!("Using Mock LLM (provider = mock)");
            Arc::new(MockLlmClient)
        }
        (_, Some(key)) => {
            tracing::info!("Using {} LLM ({})", provider, section.model);
            Arc::new(OpenAiClient::new(
                section.base_url.as_deref(),
                &section.model,
                &key,
            ))
        }
        (_, None) => {
            tracing::warn!(
                "{} not set, using Mock LLM for provider {}",
                section.api_key_env,
                provider
            );
            Arc::new(MockLlmClient)
        }
    }
}

/// 带取消与超时的单次补全：取消返回 Cancelled，超时返回 StepTimeout
pub async fn complete_guarded(
    llm: &dyn LlmClient,
    messages: &[Message],
    cancel: &CancellationToken,
    timeout_secs: u64,
) -> Result<String, AgentError> {
    let call = tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        llm.complete(messages),
    );
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AgentError::Cancelled),
        res = call => match res {
            Ok(inner) => inner.map_err(AgentError::from),
            Err(_) => Err(AgentError::StepTimeout(timeout_secs)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct HangingLlm;

    #[async_trait]
    impl LlmClient for HangingLlm {
        async fn complete(&self, _messages: &[Message]) -> Result<String, LlmError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_guarded_call_observes_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = complete_guarded(&HangingLlm, &[], &cancel, 60).await.unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
    }

    #[tokio::test]
    async fn test_guarded_call_times_out() {
        let cancel = CancellationToken::new();
        let err = complete_guarded(&HangingLlm, &[], &cancel, 1).await.unwrap_err();
        assert!(matches!(err, AgentError::StepTimeout(1)));
    }

    #[tokio::test]
    async fn test_mock_provider_needs_no_key() {
        let section = ModelSection {
            provider: "mock".into(),
            ..ModelSection::default()
        };
        let llm = create_llm_from_config(&section);
        let out = llm.complete(&[Message::user("User Request: hi")]).await.unwrap();
        assert!(out.contains("execution_plan"));
    }
}
