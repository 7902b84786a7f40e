//! The outbound model client boundary (§1: "out of scope... treated as an
//! interface"). This module defines the wire-neutral message/turn types and
//! the [`ModelProvider`] trait every provider adapter implements, plus a
//! scripted [`mock::MockModelProvider`] used by tests and the end-to-end
//! scenarios in `tests/scenarios.rs`.

pub mod mock;
pub mod types;

pub use types::{
    CompletionRequest, ContinuationDirective, ContinuationStatus, Message, MessageRole,
    ModelTurnResult, StreamChunk, ToolCall,
};

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Errors a model provider can return. Kept intentionally small — the rest
/// of the runtime treats any provider failure as a `ModelError` (§7) and
/// keeps going.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    #[error("model provider error: {0}")]
    Provider(String),
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("request cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ModelError>;

/// The outbound model client interface (§1). A concrete adapter (OpenAI,
/// Anthropic, a local model, ...) lives outside this crate's core; only the
/// shape of the call is specified here.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Stable identifier used in logs and config (`"openai"`, `"mock"`, ...).
    fn provider_name(&self) -> &str;

    /// Non-streaming completion. Most callers in this crate use
    /// [`ModelProvider::stream`] instead so the channel router can observe
    /// partial output; `complete` exists for callers (continuation
    /// summarisation, the plan schema) that only need the final text.
    async fn complete(&self, request: CompletionRequest) -> Result<ModelTurnResult>;

    /// Streaming completion. Chunks are sent on `tx` as they arrive; the
    /// final [`ModelTurnResult`] is returned once the stream completes.
    /// Implementations MUST send chunks in emission order and MUST NOT
    /// buffer the entire response before sending the first chunk.
    async fn stream(
        &self,
        request: CompletionRequest,
        tx: mpsc::Sender<StreamChunk>,
    ) -> Result<ModelTurnResult>;
}
