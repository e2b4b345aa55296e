//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 LlmClient：complete（非流式）、complete_stream（流式 Token）。
//! standalone_call 是一次性、非对话式调用：单条 user 消息，流式时收齐全部 Token 后才返回。

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use thiserror::Error;

use crate::memory::Message;

/// 流式 Token
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// LLM 调用错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Empty response")]
    EmptyResponse,
}

/// 单次调用参数；model 为 None 时由客户端使用自身默认模型
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionParams {
    pub model: Option<String>,
    pub temperature: f32,
    pub stream: bool,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            model: None,
            temperature: 0.7,
            stream: false,
        }
    }
}

/// LLM 客户端 trait：非流式完成与流式完成（返回 Token 流）
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(
        &self,
        messages: &[Message],
        params: &CompletionParams,
    ) -> Result<String, LlmError>;

    /// 流式完成，返回 Token 流
    async fn complete_stream(
        &self,
        messages: &[Message],
        params: &CompletionParams,
    ) -> Result<TokenStream, LlmError>;

    /// 按 params.stream 选择调用方式，流式时阻塞到收齐最终文本
    async fn complete_text(
        &self,
        messages: &[Message],
        params: &CompletionParams,
    ) -> Result<String, LlmError> {
        if !params.stream {
            return self.complete(messages, params).await;
        }
        let mut stream = self.complete_stream(messages, params).await?;
        let mut text = String::new();
        while let Some(token) = stream.next().await {
            text.push_str(&token?);
        }
        Ok(text)
    }

    /// 一次性调用：不依赖任何对话历史
    async fn standalone_call(
        &self,
        prompt: &str,
        params: &CompletionParams,
    ) -> Result<String, LlmError> {
        let messages = [Message::user(prompt)];
        self.complete_text(&messages, params).await
    }

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
