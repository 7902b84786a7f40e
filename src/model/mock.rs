//! A scripted [`ModelProvider`] used by unit tests and `tests/scenarios.rs`.
//!
//! A scripted test double shape (a `Vec<responses>` + an atomic cursor),
//! generalized from a single `String` response to a full
//! [`ModelTurnResult`] so tests can script tool calls, structured output,
//! and continuation directives.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{CompletionRequest, ModelError, ModelProvider, ModelTurnResult, Result, StreamChunk};

/// Replays a fixed sequence of [`ModelTurnResult`]s, one per call to
/// `complete`/`stream`. Calling past the end of the script yields a
/// `ModelError::Provider` — tests should script exactly as many turns as
/// the scenario under test drives.
pub struct MockModelProvider {
    script: Vec<ModelTurnResult>,
    cursor: AtomicUsize,
}

impl MockModelProvider {
    pub fn new(script: Vec<ModelTurnResult>) -> Self {
        Self {
            script,
            cursor: AtomicUsize::new(0),
        }
    }

    fn next_turn(&self) -> Result<ModelTurnResult> {
        let i = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.script
            .get(i)
            .cloned()
            .ok_or_else(|| ModelError::Provider(format!("mock script exhausted at call {i}")))
    }
}

#[async_trait]
impl ModelProvider for MockModelProvider {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<ModelTurnResult> {
        self.next_turn()
    }

    async fn stream(
        &self,
        _request: CompletionRequest,
        tx: mpsc::Sender<StreamChunk>,
    ) -> Result<ModelTurnResult> {
        let turn = self.next_turn()?;
        // Tool-call turns never stream content to the client (§4.4): the
        // router suppresses anything containing `"tool_calls"`. We model
        // that at the source by simply not emitting chunks for them.
        if let ModelTurnResult::Text(text) = &turn {
            for word in text.split_inclusive(' ') {
                let _ = tx.send(StreamChunk { delta: word.to_string() }).await;
            }
        }
        Ok(turn)
    }
}
