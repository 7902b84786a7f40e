//! Slash commands and `@path` file references in user messages (§4.9).

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::agent::AgentConfig;
use crate::model::Message;

pub const HELP_TEXT: &str = "\
Available commands:
  /clear [agent_id|all]  purge context of one agent (default: active) or all
  /save [path]           write a JSON snapshot of all agents to disk
  /load <path>           restore agents from a JSON snapshot
  /debug on|off [opts]   toggle debug sections (single_tool, verbose_progress,
                         force_sequential, explicit_continuation) and rebuild
                         the active agent's system prompt
  /help                  show this message";

pub const DEBUG_OPTION_NAMES: &[&str] =
    &["single_tool", "verbose_progress", "force_sequential", "explicit_continuation"];

fn at_reference_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@([./\w-]+?\.\w+)(?::(\d+)-(\d+))?\b").expect("valid regex"))
}

/// Splice `@path[:start-end]` references in `message` into inline fenced
/// blocks, resolving relative paths against `workspace_root` (§4.9: "the
/// referenced file content is spliced into the message as an inline
/// block"). References to files outside the workspace or that cannot be
/// read are left untouched — this is advisory convenience, not a strict
/// grammar, so a stray `@mention` in prose does not break the message.
pub fn splice_file_references(message: &str, workspace_root: &PathBuf) -> (String, bool) {
    let mut spliced_any = false;
    let result = at_reference_regex()
        .replace_all(message, |caps: &regex::Captures| {
            let rel_path = &caps[1];
            let candidate = workspace_root.join(rel_path);
            let Ok(content) = std::fs::read_to_string(&candidate) else {
                return caps[0].to_string();
            };
            let sliced = match (caps.get(2), caps.get(3)) {
                (Some(start), Some(end)) => {
                    let start: usize = start.as_str().parse().unwrap_or(1);
                    let end: usize = end.as_str().parse().unwrap_or(start);
                    content
                        .lines()
                        .skip(start.saturating_sub(1))
                        .take(end.saturating_sub(start).saturating_add(1))
                        .collect::<Vec<_>>()
                        .join("\n")
                }
                _ => content,
            };
            spliced_any = true;
            format!("{}\n\n```{rel_path}\n{sliced}\n```", &caps[0])
        })
        .into_owned();
    (result, spliced_any)
}

/// A persisted agent snapshot (§6 persisted state layout: `agents.<id>`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedAgent {
    pub config: AgentConfig,
    pub messages: Vec<Message>,
}

/// The full `/save` document (§6: `{session_id, is_started, active_agent,
/// introduced_agents, agents, saved_at, version}`). Both the tool-call
/// assistant message and the subsequent tool-result-round assistant
/// message are retained verbatim in `messages` (§9 ambiguity #1: "the
/// reimplementation should pick 'retain both' and document it").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedSession {
    pub session_id: String,
    pub is_started: bool,
    pub active_agent: Option<String>,
    pub introduced_agents: Vec<String>,
    pub agents: BTreeMap<String, SavedAgent>,
    pub saved_at: chrono::DateTime<Utc>,
    pub version: String,
}
