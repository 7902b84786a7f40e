//! C8: Agent-Switch Handler (§4.8).
//!
//! Grounded on `original_source/api/agent_switch_handler.py`'s
//! `AgentSwitchHandler`: the `switch_stack` representation, the exact depth
//! check (`stack.len() >= MaxSwitchDepth`), the immediate-self-target and
//! already-on-stack circular checks, and the two distinct bracketed
//! messages for "depth exceeded" vs "circular mail detected". Like
//! [`crate::continuation`], this module is pure decision logic —
//! [`crate::session::Session`] owns the actual `Vec<SwitchFrame>` per
//! session and performs the nested turn.

use std::collections::HashMap;

/// Default `MaxSwitchDepth` (§4.8 step 2).
pub const DEFAULT_MAX_SWITCH_DEPTH: usize = 5;

/// One entry on a session's switch stack (§4.8 step 3: "Pushes a SwitchFrame
/// { current agent id, continuation-depth snapshot }").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchFrame {
    pub agent_id: String,
    pub continuation_depth: usize,
}

/// The result of validating a requested switch (§4.8 step 2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchDecision {
    /// Validation passed; push `frame` and activate `target_agent_id`.
    Activate {
        frame: SwitchFrame,
        target_agent_id: String,
    },
    /// Validation failed; `message` is the already-formatted bracketed
    /// reply to append to the caller's response, and no switch occurs
    /// (§4.8: "Violating the invariants in step 2 returns a warning string
    /// and performs no switch").
    Rejected { message: String },
}

/// Resolve `requested` (a short id, full name, or first name) against a
/// `{agent_id: display_name}` map (§4.8 step 1). Falls back to treating
/// `requested` itself as an id if nothing matches, mirroring the source's
/// fallback mapping.
pub fn resolve_target_id(requested: &str, known_agents: &HashMap<String, String>) -> String {
    if known_agents.contains_key(requested) {
        return requested.to_string();
    }
    let requested_lower = requested.to_ascii_lowercase();
    for (id, name) in known_agents {
        if name.to_ascii_lowercase() == requested_lower {
            return id.clone();
        }
        let first_word = name.to_ascii_lowercase();
        let first_word = first_word.split_whitespace().next().unwrap_or(&first_word);
        if first_word == requested_lower {
            return id.clone();
        }
    }
    requested_lower
}

/// Validate and decide a switch request (§4.8 step 2-3).
pub fn decide(
    stack: &[SwitchFrame],
    current_agent_id: &str,
    target_agent_id: &str,
    continuation_depth: usize,
    max_depth: usize,
) -> SwitchDecision {
    if target_agent_id == current_agent_id {
        return SwitchDecision::Rejected {
            message: "\n\n[Warning: Agent cannot send mail to itself]".to_string(),
        };
    }

    if stack.len() >= max_depth {
        let chain = format_chain(stack, current_agent_id);
        return SwitchDecision::Rejected {
            message: format!(
                "\n\n[Error: Maximum agent switch depth exceeded - possible circular mail scenario. Switch stack: {chain}]"
            ),
        };
    }

    if stack.iter().any(|frame| frame.agent_id == target_agent_id) {
        let chain = format_chain(stack, current_agent_id);
        return SwitchDecision::Rejected {
            message: format!(
                "\n\n[Warning: Circular mail detected - {target_agent_id} is already processing mail in this chain: {chain}]"
            ),
        };
    }

    SwitchDecision::Activate {
        frame: SwitchFrame {
            agent_id: current_agent_id.to_string(),
            continuation_depth,
        },
        target_agent_id: target_agent_id.to_string(),
    }
}

fn format_chain(stack: &[SwitchFrame], current_agent_id: &str) -> String {
    let mut parts: Vec<&str> = stack.iter().map(|f| f.agent_id.as_str()).collect();
    parts.push(current_agent_id);
    parts.join(" -> ")
}

/// The notification message sent to the activated agent (§4.8 step 5).
pub fn activation_notice(from_agent_id: &str) -> String {
    format!(
        "You have been activated via agent switch from {from_agent_id}. Use the check_mail tool to read your mailbox."
    )
}

/// Format the target's reply for appending to the caller's response (§4.8
/// step 8).
pub fn format_switch_reply(target_agent_id: &str, reply: &str) -> String {
    if reply.trim().is_empty() {
        format!("\n\n[Mail sent to {target_agent_id} - no response received]")
    } else {
        format!("\n\n[{target_agent_id} processed the mail and responded: {reply}]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_by_full_name_case_insensitive() {
        let mut known = HashMap::new();
        known.insert("p".to_string(), "Patricia".to_string());
        assert_eq!(resolve_target_id("patricia", &known), "p");
        assert_eq!(resolve_target_id("Patricia", &known), "p");
    }

    #[test]
    fn resolves_by_direct_id() {
        let mut known = HashMap::new();
        known.insert("p".to_string(), "Patricia".to_string());
        assert_eq!(resolve_target_id("p", &known), "p");
    }

    #[test]
    fn unresolved_name_falls_back_to_lowercased_input() {
        let known = HashMap::new();
        assert_eq!(resolve_target_id("Ghost", &known), "ghost");
    }

    #[test]
    fn rejects_self_switch() {
        let decision = decide(&[], "a", "a", 0, DEFAULT_MAX_SWITCH_DEPTH);
        assert_eq!(
            decision,
            SwitchDecision::Rejected {
                message: "\n\n[Warning: Agent cannot send mail to itself]".to_string()
            }
        );
    }

    #[test]
    fn rejects_when_depth_exceeded() {
        let stack: Vec<SwitchFrame> = (0..5)
            .map(|i| SwitchFrame { agent_id: format!("agent{i}"), continuation_depth: 0 })
            .collect();
        let decision = decide(&stack, "agent5", "agent6", 0, 5);
        assert!(matches!(decision, SwitchDecision::Rejected { .. }));
    }

    #[test]
    fn rejects_circular_target_already_on_stack() {
        let stack = vec![SwitchFrame { agent_id: "a".to_string(), continuation_depth: 0 }];
        let decision = decide(&stack, "b", "a", 0, DEFAULT_MAX_SWITCH_DEPTH);
        match decision {
            SwitchDecision::Rejected { message } => assert!(message.contains("Circular mail detected")),
            SwitchDecision::Activate { .. } => panic!("expected rejection"),
        }
    }

    #[test]
    fn activates_when_valid() {
        let decision = decide(&[], "a", "b", 2, DEFAULT_MAX_SWITCH_DEPTH);
        assert_eq!(
            decision,
            SwitchDecision::Activate {
                frame: SwitchFrame { agent_id: "a".to_string(), continuation_depth: 2 },
                target_agent_id: "b".to_string(),
            }
        );
    }

    #[test]
    fn reply_formatting() {
        assert_eq!(
            format_switch_reply("b", "done"),
            "\n\n[b processed the mail and responded: done]"
        );
        assert_eq!(
            format_switch_reply("b", ""),
            "\n\n[Mail sent to b - no response received]"
        );
    }
}
