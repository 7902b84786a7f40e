//! C7: Agent Loop (§4.7) — one call to `Agent.process` executes one turn.
//!
//! A single-pass streaming call with a cancel-flag checked at suspension
//! points, tool calls executed in
//! declaration order with fail-soft tool-role messages, and a bounded
//! tool-result re-entry. Switching agents (C8) and continuation re-entry
//! (C5) are deliberately NOT performed here — §4.8 has the Switch Handler
//! call back into `Session.sendUserMessage`/`switchAgent`, and §4.5 has the
//! Continuation Controller re-enter across turns — both require mutating
//! state (`active_agent_id`, `continuation_depth`) that only
//! [`crate::session::Session`] owns. This loop is a single-turn primitive
//! Session drives repeatedly.

use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tokio::sync::mpsc;

use crate::channel::{ChannelMessage, ChannelRouter, NotificationSink, StreamAccumulator, StreamDecision};
use crate::model::{CompletionRequest, Message, ModelError, ModelProvider, ModelTurnResult, StreamChunk};
use crate::tools::{ToolContext, ToolView};

use super::config::GenerationParams;
use super::context::Context;

/// Everything one `run_turn` call needs that isn't part of the mutable
/// `Context` it operates on.
pub struct TurnDeps<'a> {
    pub provider: &'a dyn ModelProvider,
    pub tool_view: &'a ToolView,
    pub router: &'a ChannelRouter,
    pub sink: &'a dyn NotificationSink,
    pub agent_id: &'a str,
    pub session_id: &'a str,
    pub model: &'a str,
    pub generation: GenerationParams,
    /// A JSON-schema response format hint (§4.10); `None` means plain
    /// text/tool-call mode.
    pub response_schema: Option<Value>,
    pub continuation_depth: Option<usize>,
    pub cancel_flag: &'a AtomicBool,
}

/// What one `run_turn` call produced.
pub struct TurnOutcome {
    /// The turn's terminal result (round 2's, if a tool-result round ran).
    pub turn: ModelTurnResult,
    /// Every non-partial channel message emitted this turn, in emission
    /// order (for tests and `/save`-adjacent bookkeeping; the same
    /// messages have already reached `deps.sink`).
    pub emitted: Vec<ChannelMessage>,
    /// Set when a tool call this turn reported `switch_to_agent` (§4.8
    /// step 1's input — `Session` resolves and validates the target).
    pub switch_requested: Option<String>,
    /// Tool calls executed this turn (round 1 only — §4.7 step 5 never
    /// executes round 2's), reported back in `sendUserMessage`'s result
    /// (§6).
    pub executed_tool_calls: Vec<crate::model::ToolCall>,
    /// True if the cancel flag was observed mid-stream; when set, no
    /// assistant message was committed to `context` (§4.7: "partial state
    /// is NOT committed to context").
    pub cancelled: bool,
}

/// Stateless driver for one turn (§4.7). Holds no fields — a namespace for
/// `run_turn` plus its private helpers.
pub struct AgentLoop;

impl AgentLoop {
    /// Run one turn against `context`, mutating it in place with the
    /// assistant/tool-role messages produced (§4.7 steps 1-6).
    pub async fn run_turn(context: &mut Context, deps: TurnDeps<'_>) -> TurnOutcome {
        let mut emitted = Vec::new();

        let (round1, cancelled) = Self::call_model(context, &deps).await;
        let round1 = match round1 {
            Ok(turn) => turn,
            Err(ModelError::Cancelled) => {
                return TurnOutcome {
                    turn: ModelTurnResult::Error {
                        message: "request cancelled".to_string(),
                    },
                    emitted,
                    switch_requested: None,
                    executed_tool_calls: Vec::new(),
                    cancelled: true,
                };
            }
            Err(err) => ModelTurnResult::Error { message: err.to_string() },
        };
        if cancelled {
            return TurnOutcome {
                turn: round1,
                emitted,
                switch_requested: None,
                executed_tool_calls: Vec::new(),
                cancelled: true,
            };
        }

        let ModelTurnResult::ToolCalls { content, calls } = &round1 else {
            context.push(Self::assistant_message(&round1));
            emitted.extend(deps.router.route_final(&round1, deps.agent_id, deps.continuation_depth));
            for message in &emitted {
                deps.sink.deliver(message.clone());
            }
            return TurnOutcome {
                turn: round1,
                emitted,
                switch_requested: None,
                executed_tool_calls: Vec::new(),
                cancelled: false,
            };
        };

        let executed_tool_calls = calls.clone();
        context.push(Message::assistant_with_tool_calls(content.clone(), calls.clone()));

        let tool_ctx = ToolContext {
            agent_id: deps.agent_id.to_string(),
            session_id: deps.session_id.to_string(),
        };
        let mut switch_requested = None;
        for call in calls {
            let result = match deps.tool_view.get(&call.name) {
                Some(tool) => tool.execute(call.arguments.clone(), &tool_ctx).await,
                None => crate::tools::ToolResult::err(format!("unknown tool: {}", call.name)),
            };
            if switch_requested.is_none() && result.success {
                switch_requested = result.switch_to_agent.clone();
            }
            context.push(Message::tool_result(call.id.clone(), result.output.clone()));
        }

        // The tool-result round (§4.7 step 5: "Re-enter step 2 once").
        let (round2, cancelled) = Self::call_model(context, &deps).await;
        let round2 = match round2 {
            Ok(turn) => turn,
            Err(ModelError::Cancelled) => {
                return TurnOutcome {
                    turn: ModelTurnResult::Error {
                        message: "request cancelled".to_string(),
                    },
                    emitted,
                    switch_requested,
                    executed_tool_calls,
                    cancelled: true,
                };
            }
            Err(err) => ModelTurnResult::Error { message: err.to_string() },
        };
        if cancelled {
            return TurnOutcome {
                turn: round2,
                emitted,
                switch_requested,
                executed_tool_calls,
                cancelled: true,
            };
        }

        // Do NOT execute tool calls surfaced by round 2 (§4.7 step 5: "Do
        // not recurse further on tool-calls from the second round unless
        // the Continuation Controller re-enters"); store and emit whatever
        // text it carries.
        context.push(Self::assistant_message(&round2));
        emitted.extend(deps.router.route_final(&round2, deps.agent_id, deps.continuation_depth));
        for message in &emitted {
            deps.sink.deliver(message.clone());
        }

        TurnOutcome {
            turn: round2,
            emitted,
            switch_requested,
            executed_tool_calls,
            cancelled: false,
        }
    }

    fn assistant_message(turn: &ModelTurnResult) -> Message {
        match turn {
            ModelTurnResult::ToolCalls { content, calls } => {
                Message::assistant_with_tool_calls(content.clone(), calls.clone())
            }
            other => Message::assistant(other.visible_text()),
        }
    }

    /// Assemble the request from the current context and stream it,
    /// forwarding deliverable partial chunks to `deps.sink` as they arrive
    /// (§4.7 steps 2-3). Returns `(result, cancelled)`.
    async fn call_model(
        context: &Context,
        deps: &TurnDeps<'_>,
    ) -> (crate::model::Result<ModelTurnResult>, bool) {
        let mut request = CompletionRequest::new(deps.model, context.messages().to_vec())
            .with_tools(deps.tool_view.tools().iter().map(|t| t.info()).collect());
        if let Some(temperature) = deps.generation.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = deps.generation.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        if let Some(schema) = deps.response_schema.clone() {
            request = request.with_response_schema(schema);
        }

        let (tx, mut rx) = mpsc::channel::<StreamChunk>(32);
        let mut accumulator = StreamAccumulator::new();
        let mut cancelled = false;

        let drain = async {
            while let Some(chunk) = rx.recv().await {
                if deps.cancel_flag.load(Ordering::SeqCst) {
                    cancelled = true;
                    break;
                }
                if let StreamDecision::Deliver(text) = accumulator.push(&chunk.delta) {
                    deps.sink.deliver(deps.router.emit_partial(&text, deps.agent_id));
                }
            }
        };

        let (result, ()) = tokio::join!(deps.provider.stream(request, tx), drain);
        if cancelled {
            return (Err(ModelError::Cancelled), true);
        }
        (result, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::NullSink;
    use crate::mailbox::Mailbox;
    use crate::model::mock::MockModelProvider;
    use crate::model::ToolCall;
    use crate::tools::builtin::{CheckMailTool, SendMailTool};
    use crate::tools::{ToolFilterSpec, ToolRegistry};
    use std::sync::Arc;

    fn deps<'a>(
        provider: &'a MockModelProvider,
        tool_view: &'a ToolView,
        router: &'a ChannelRouter,
        cancel_flag: &'a AtomicBool,
    ) -> TurnDeps<'a> {
        TurnDeps {
            provider,
            tool_view,
            router,
            sink: &NullSink,
            agent_id: "agent-a",
            session_id: "session-1",
            model: "mock-1",
            generation: GenerationParams::default(),
            response_schema: None,
            continuation_depth: None,
            cancel_flag,
        }
    }

    #[tokio::test]
    async fn plain_text_turn_is_stored_and_emitted() {
        let provider = MockModelProvider::new(vec![ModelTurnResult::Text("hi there".into())]);
        let tool_view = ToolView::empty();
        let router = ChannelRouter::new("session-1");
        let cancel = AtomicBool::new(false);
        let mut context = Context::with_system_prompt("be helpful");

        let outcome = AgentLoop::run_turn(&mut context, deps(&provider, &tool_view, &router, &cancel)).await;

        assert!(!outcome.cancelled);
        assert_eq!(outcome.turn.visible_text(), "hi there");
        assert_eq!(outcome.emitted.len(), 1);
        assert_eq!(context.len(), 2); // system + assistant
    }

    #[tokio::test]
    async fn tool_calls_execute_then_reenter_once() {
        let call = ToolCall {
            id: "call-1".to_string(),
            name: "check_mail".to_string(),
            arguments: serde_json::json!({}),
        };
        let provider = MockModelProvider::new(vec![
            ModelTurnResult::ToolCalls {
                content: String::new(),
                calls: vec![call],
            },
            ModelTurnResult::Text("mailbox is empty, all done".into()),
        ]);

        let registry = ToolRegistry::new();
        let mailbox = Arc::new(Mailbox::new());
        registry.register(Arc::new(CheckMailTool::new(mailbox)));
        let tool_view = ToolView::resolve(&registry, &ToolFilterSpec { allow: vec!["check_mail".into()], ..Default::default() });

        let router = ChannelRouter::new("session-1");
        let cancel = AtomicBool::new(false);
        let mut context = Context::with_system_prompt("be helpful");

        let outcome = AgentLoop::run_turn(&mut context, deps(&provider, &tool_view, &router, &cancel)).await;

        assert!(!outcome.cancelled);
        assert_eq!(outcome.turn.visible_text(), "mailbox is empty, all done");
        // system, assistant(tool_calls), tool-result, assistant(final)
        assert_eq!(context.len(), 4);
        assert_eq!(context.messages()[2].role, crate::model::MessageRole::Tool);
    }

    #[tokio::test]
    async fn second_round_tool_calls_are_not_executed() {
        let call = ToolCall {
            id: "call-1".to_string(),
            name: "check_mail".to_string(),
            arguments: serde_json::json!({}),
        };
        let second_call = ToolCall {
            id: "call-2".to_string(),
            name: "check_mail".to_string(),
            arguments: serde_json::json!({}),
        };
        let provider = MockModelProvider::new(vec![
            ModelTurnResult::ToolCalls {
                content: String::new(),
                calls: vec![call],
            },
            ModelTurnResult::ToolCalls {
                content: "still want more".to_string(),
                calls: vec![second_call],
            },
        ]);

        let registry = ToolRegistry::new();
        let mailbox = Arc::new(Mailbox::new());
        registry.register(Arc::new(CheckMailTool::new(mailbox)));
        let tool_view = ToolView::resolve(&registry, &ToolFilterSpec { allow: vec!["check_mail".into()], ..Default::default() });

        let router = ChannelRouter::new("session-1");
        let cancel = AtomicBool::new(false);
        let mut context = Context::with_system_prompt("be helpful");

        let outcome = AgentLoop::run_turn(&mut context, deps(&provider, &tool_view, &router, &cancel)).await;

        assert_eq!(outcome.turn.visible_text(), "still want more");
        // only one tool-result message should exist (from round 1)
        let tool_messages = context.messages().iter().filter(|m| m.role == crate::model::MessageRole::Tool).count();
        assert_eq!(tool_messages, 1);
    }

    #[tokio::test]
    async fn unknown_tool_produces_error_result_without_panicking() {
        let call = ToolCall {
            id: "call-1".to_string(),
            name: "does_not_exist".to_string(),
            arguments: serde_json::json!({}),
        };
        let provider = MockModelProvider::new(vec![
            ModelTurnResult::ToolCalls {
                content: String::new(),
                calls: vec![call],
            },
            ModelTurnResult::Text("handled".into()),
        ]);
        let tool_view = ToolView::empty();
        let router = ChannelRouter::new("session-1");
        let cancel = AtomicBool::new(false);
        let mut context = Context::with_system_prompt("be helpful");

        let outcome = AgentLoop::run_turn(&mut context, deps(&provider, &tool_view, &router, &cancel)).await;
        assert_eq!(outcome.turn.visible_text(), "handled");
        let tool_message = context
            .messages()
            .iter()
            .find(|m| m.role == crate::model::MessageRole::Tool)
            .expect("tool result message present");
        assert!(tool_message.content.contains("unknown tool"));
    }

    #[tokio::test]
    async fn switch_hint_is_surfaced_without_being_acted_on() {
        let call = ToolCall {
            id: "call-1".to_string(),
            name: "send_mail_with_switch".to_string(),
            arguments: serde_json::json!({"to_agent": "b", "subject": "s", "body": "hand this off"}),
        };
        let provider = MockModelProvider::new(vec![
            ModelTurnResult::ToolCalls {
                content: String::new(),
                calls: vec![call],
            },
            ModelTurnResult::Text("done".into()),
        ]);

        let registry = ToolRegistry::new();
        let mailbox = Arc::new(Mailbox::new());
        registry.register(Arc::new(crate::tools::builtin::SendMailWithSwitchTool::new(mailbox)));
        let tool_view = ToolView::resolve(
            &registry,
            &ToolFilterSpec { allow: vec!["send_mail_with_switch".into()], ..Default::default() },
        );

        let router = ChannelRouter::new("session-1");
        let cancel = AtomicBool::new(false);
        let mut context = Context::with_system_prompt("be helpful");

        let outcome = AgentLoop::run_turn(&mut context, deps(&provider, &tool_view, &router, &cancel)).await;
        assert_eq!(outcome.switch_requested.as_deref(), Some("b"));
    }
}
