//! Structured-output policy (§4.10): decide whether a turn's request should
//! carry a JSON-schema response format, and which one.
//!
//! Three rules, checked in order:
//! 1. A planner agent asked to produce a step-by-step plan gets the plan
//!    schema, so downstream tooling can consume `steps` directly.
//! 2. Otherwise, any agent with at least one tool available gets the
//!    `{analysis, commentary, final, continuation}` channel schema, so the
//!    Channel Router (C4) and Continuation Controller (C5) have something
//!    to parse.
//! 3. A provider flagged as not supporting structured output (or tool use)
//!    never gets a schema — it always answers in plain text.

use serde_json::{Value, json};

const PLAN_INDICATORS: &[&str] = &[
    "create a plan",
    "break this down into steps",
    "break it down into steps",
    "plan out",
    "step-by-step plan",
];

fn channel_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "analysis": {"type": "string"},
            "commentary": {"type": "string"},
            "final": {"type": "string"},
            "continuation": {
                "type": "object",
                "properties": {
                    "status": {"type": "string", "enum": ["CONTINUE", "TERMINATE"]},
                    "reason": {"type": "string"}
                },
                "required": ["status"]
            }
        },
        "required": ["final"]
    })
}

fn plan_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "steps": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "description": {"type": "string"},
                        "done": {"type": "boolean"}
                    },
                    "required": ["description"]
                }
            },
            "final": {"type": "string"}
        },
        "required": ["steps", "final"]
    })
}

fn looks_like_plan_request(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    PLAN_INDICATORS.iter().any(|marker| lower.contains(marker))
}

/// Choose a response schema for the upcoming turn, or `None` for plain
/// text/tool-call mode.
pub fn select_response_schema(
    is_planner: bool,
    latest_user_message: &str,
    agent_has_tools: bool,
    provider_supports_structured_output: bool,
) -> Option<Value> {
    if !provider_supports_structured_output {
        return None;
    }
    if is_planner && looks_like_plan_request(latest_user_message) {
        return Some(plan_schema());
    }
    if agent_has_tools {
        return Some(channel_schema());
    }
    None
}
