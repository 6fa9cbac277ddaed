//! LLM Provider trait and the error alphabet every adapter normalizes onto.

use crate::types::{LlmRequest, StreamEvent};
use agenticlaw_core::AbortToken;
use futures::Stream;
use std::pin::Pin;

pub type LlmResult<T> = Result<T, LlmError>;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("context overflow: {0}")]
    ContextOverflow(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("cancelled")]
    Cancelled,

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// Stream of normalized events from a provider's streaming completion call.
pub type LlmStream = Pin<Box<dyn Stream<Item = LlmResult<StreamEvent>> + Send>>;

/// A chat-completion backend. Implementors own their own HTTP client and
/// authentication; the agent loop only ever sees the normalized [`StreamEvent`]
/// alphabet regardless of which provider produced it.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;
    fn models(&self) -> &[&str];

    fn supports_model(&self, model: &str) -> bool {
        self.models()
            .iter()
            .any(|m| *m == model || model.starts_with(m))
    }

    /// Stream a completion response. If `abort` is provided and already (or
    /// later) tripped, the adapter drops the underlying connection and the
    /// stream yields [`LlmError::Cancelled`] instead of running to completion.
    async fn complete_stream(
        &self,
        request: LlmRequest,
        abort: Option<AbortToken>,
    ) -> LlmResult<LlmStream>;
}
