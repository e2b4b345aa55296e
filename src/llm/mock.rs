//! Mock LLM 客户端（用于测试与无 API Key 的本地运行）
//!
//! 按顺序返回预设回复；脚本用尽后返回固定的结束语。记录每次收到的消息与参数，便于断言。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream;

use crate::llm::{CompletionParams, LlmClient, LlmError, TokenStream};
use crate::memory::Message;

/// 脚本用尽后的默认回复
pub const MOCK_FINAL_REPLY: &str = "Task complete.";

/// 单次请求记录
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub params: CompletionParams,
}

/// Mock 客户端：脚本化回复
#[derive(Debug, Default)]
pub struct MockLlmClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按顺序返回给定回复
    pub fn scripted<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// 追加一次失败回复
    pub fn push_error(&self, err: LlmError) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(Err(err));
        }
    }

    /// 已收到的请求
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    fn next_reply(&self, messages: &[Message], params: &CompletionParams) -> Result<String, LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                messages: messages.to_vec(),
                params: params.clone(),
            });
        }
        self.replies
            .lock()
            .ok()
            .and_then(|mut r| r.pop_front())
            .unwrap_or_else(|| Ok(MOCK_FINAL_REPLY.to_string()))
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(
        &self,
        messages: &[Message],
        params: &CompletionParams,
    ) -> Result<String, LlmError> {
        self.next_reply(messages, params)
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        params: &CompletionParams,
    ) -> Result<TokenStream, LlmError> {
        let content = self.next_reply(messages, params)?;
        // 按空白切分模拟 Token 流，拼接后与原文一致
        let tokens: Vec<Result<String, LlmError>> = content
            .split_inclusive(char::is_whitespace)
            .map(|t| Ok(t.to_string()))
            .collect();
        Ok(Box::pin(stream::iter(tokens)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_replies_in_order() {
        let llm = MockLlmClient::scripted(["first", "second"]);
        let params = CompletionParams::default();
        assert_eq!(llm.complete(&[], &params).await.unwrap(), "first");
        assert_eq!(llm.complete(&[], &params).await.unwrap(), "second");
        assert_eq!(llm.complete(&[], &params).await.unwrap(), MOCK_FINAL_REPLY);
        assert_eq!(llm.call_count(), 3);
    }

    #[tokio::test]
    async fn test_stream_collects_to_full_text() {
        let llm = MockLlmClient::scripted(["  a::Foo  is best "]);
        let params = CompletionParams {
            stream: true,
            ..CompletionParams::default()
        };
        let text = llm.standalone_call("pick one", &params).await.unwrap();
        assert_eq!(text, "  a::Foo  is best ");

        let requests = llm.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages, vec![Message::user("pick one")]);
        assert!(requests[0].params.stream);
    }

    #[tokio::test]
    async fn test_scripted_error() {
        let llm = MockLlmClient::new();
        llm.push_error(LlmError::EmptyResponse);
        let err = llm.complete(&[], &CompletionParams::default()).await.unwrap_err();
        assert_eq!(err, LlmError::EmptyResponse);
    }
}
