//! [`ChannelRouter`] — parses model output into ordered, sequence-numbered
//! `{analysis, commentary, final}` messages (§4.4).

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

use crate::model::{ContinuationDirective, ModelTurnResult};

/// One of the three channels a turn's output is split into (§3 Data Model:
/// ChannelMessage, GLOSSARY Channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Analysis,
    Commentary,
    Final,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMessageMetadata {
    pub timestamp: DateTime<Utc>,
    pub agent_id: String,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_depth: Option<usize>,
    pub is_partial: bool,
}

/// One emitted channel message (§3 Data Model: ChannelMessage). `sequence`
/// is assigned per session, strictly increasing across all channels within
/// a session (§8 property 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub sequence: u64,
    pub channel: ChannelKind,
    pub content: String,
    pub metadata: ChannelMessageMetadata,
}

/// Per-session sequence counter plus the streaming accumulation state for
/// the in-flight turn.
pub struct ChannelRouter {
    sequence: AtomicU64,
    session_id: String,
}

fn final_fragment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""final"\s*:\s*"((?:[^"\\]|\\.)*)"#).expect("valid regex"))
}

/// Best-effort JSON-string unescaping for a (possibly truncated) `final`
/// fragment extracted mid-stream (§9 ambiguity #2: "partial streaming is
/// advisory; the non-partial final message is authoritative").
fn decode_json_string_fragment(fragment: &str) -> String {
    // Wrap in quotes and attempt a real JSON parse; if the fragment is
    // truncated (unterminated escape, odd trailing backslash) fall back to
    // a naive unescape of the common sequences.
    if let Ok(Value::String(s)) = serde_json::from_str::<Value>(&format!("\"{fragment}\"")) {
        return s;
    }
    fragment
        .replace("\\\"", "\"")
        .replace("\\n", "\n")
        .replace("\\t", "\t")
        .replace("\\\\", "\\")
}

impl ChannelRouter {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            sequence: AtomicU64::new(1),
            session_id: session_id.into(),
        }
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst)
    }

    fn metadata(&self, agent_id: &str, continuation_depth: Option<usize>, is_partial: bool) -> ChannelMessageMetadata {
        ChannelMessageMetadata {
            timestamp: Utc::now(),
            agent_id: agent_id.to_string(),
            session_id: self.session_id.clone(),
            continuation_depth,
            is_partial,
        }
    }

    /// Route a terminal [`ModelTurnResult`] into its non-partial
    /// [`ChannelMessage`]s, in `analysis, commentary, final` order, skipping
    /// empty channels (§4.4 rules).
    pub fn route_final(
        &self,
        turn: &ModelTurnResult,
        agent_id: &str,
        continuation_depth: Option<usize>,
    ) -> Vec<ChannelMessage> {
        match turn {
            ModelTurnResult::Text(text) => vec![self.emit(ChannelKind::Final, text, agent_id, continuation_depth, false)],
            ModelTurnResult::ToolCalls { content, .. } => {
                // A tool-call turn is not yet terminal; if there is
                // accompanying text, it still routes as `final`, but the
                // tool-call structure itself is never emitted as a channel
                // message (§8 property 3: tool-call invisibility).
                if content.trim().is_empty() {
                    Vec::new()
                } else {
                    vec![self.emit(ChannelKind::Final, content, agent_id, continuation_depth, false)]
                }
            }
            ModelTurnResult::Structured {
                analysis,
                commentary,
                r#final,
                ..
            } => {
                let mut out = Vec::new();
                if !analysis.trim().is_empty() {
                    out.push(self.emit(ChannelKind::Analysis, analysis, agent_id, continuation_depth, false));
                }
                if !commentary.trim().is_empty() {
                    out.push(self.emit(ChannelKind::Commentary, commentary, agent_id, continuation_depth, false));
                }
                if !r#final.trim().is_empty() {
                    out.push(self.emit(ChannelKind::Final, r#final, agent_id, continuation_depth, false));
                }
                out
            }
            ModelTurnResult::Error { message } => {
                vec![self.emit(ChannelKind::Final, message, agent_id, continuation_depth, false)]
            }
        }
    }

    fn emit(
        &self,
        channel: ChannelKind,
        content: &str,
        agent_id: &str,
        continuation_depth: Option<usize>,
        is_partial: bool,
    ) -> ChannelMessage {
        ChannelMessage {
            sequence: self.next_sequence(),
            channel,
            content: content.to_string(),
            metadata: self.metadata(agent_id, continuation_depth, is_partial),
        }
    }

    /// Emit a partial `final` chunk, consuming its own sequence number
    /// (§3: "a partial chunk and its eventual final chunk have different
    /// sequences").
    pub fn emit_partial(&self, content: &str, agent_id: &str) -> ChannelMessage {
        self.emit(ChannelKind::Final, content, agent_id, None, true)
    }
}

/// Per-turn streaming accumulation state (§4.4 "Streaming chunks: the
/// router accumulates..."). One instance per in-flight model call.
#[derive(Default)]
pub struct StreamAccumulator {
    buffer: String,
    tool_calls_suppressed: bool,
    extracted_final_len: usize,
}

/// What a raw streaming delta resolves to for client delivery.
pub enum StreamDecision {
    /// No client-visible effect this chunk (structured output still
    /// accumulating, or tool-call structure detected).
    Withheld,
    /// Plain text or a newly-extracted slice of the `final` field; safe to
    /// stream to the client as a partial chunk.
    Deliver(String),
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one streaming delta and decide what (if anything) reaches the
    /// client (§4.4, §8 properties 2 and 3).
    pub fn push(&mut self, delta: &str) -> StreamDecision {
        self.buffer.push_str(delta);

        if self.buffer.contains("\"tool_calls\"") {
            self.tool_calls_suppressed = true;
        }
        if self.tool_calls_suppressed {
            return StreamDecision::Withheld;
        }

        let trimmed = self.buffer.trim_start();
        let looks_structured =
            trimmed.starts_with('{') && (trimmed.contains("\"analysis\"") || trimmed.contains("\"commentary\""));

        if !looks_structured {
            return StreamDecision::Deliver(delta.to_string());
        }

        let Some(caps) = final_fragment_regex().captures(&self.buffer) else {
            return StreamDecision::Withheld;
        };
        let fragment = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let decoded = decode_json_string_fragment(fragment);
        if decoded.chars().count() <= self.extracted_final_len {
            return StreamDecision::Withheld;
        }
        let new_text: String = decoded.chars().skip(self.extracted_final_len).collect();
        self.extracted_final_len = decoded.chars().count();
        StreamDecision::Deliver(new_text)
    }
}
