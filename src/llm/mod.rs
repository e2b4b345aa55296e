//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock）

pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

use crate::config::AppConfig;

pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::{CompletionParams, LlmClient, LlmError, TokenStream};

/// 根据配置与环境变量选择 LLM 后端：有 OPENAI_API_KEY 且 provider 为 openai 时走 OpenAI 兼容端点，否则 Mock
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let api_key = std::env::var("OPENAI_API_KEY").ok();

    match (provider.as_str(), api_key) {
        ("openai", Some(key)) => {
            tracing::info!("Using OpenAI LLM ({})", cfg.llm.model);
            Arc::new(OpenAiClient::new(
                cfg.llm.base_url.as_deref(),
                &cfg.llm.model,
                Some(&key),
            ))
        }
        _ => {
            tracing::warn!("No API key set or provider is mock, using Mock LLM");
            Arc::new(MockLlmClient::new())
        }
    }
}
