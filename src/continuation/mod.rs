//! C5: Continuation Controller (§4.5, §3 Data Model:
//! ContinuationState).
//!
//! A pure decision function: given the just-completed turn's visible text
//! and an optional structured `continuation` directive, decide whether the
//! session should synthesize a continuation message and re-enter the loop.
//! [`crate::session::Session`] owns the actual depth counter (per §4.5:
//! "Depth is per-session, not per-agent") and performs the re-entry.

use crate::model::{ContinuationDirective, ContinuationStatus};

/// What the session should do after a turn completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContinuationDecision {
    /// Re-enter the loop on the same agent with this synthesized user
    /// message; depth should become `new_depth`.
    Reenter { message: String, new_depth: usize },
    /// No further continuation; the session should reset its depth to 0.
    Done,
}

/// Phrases that, appearing in an error-finish's text, indicate the model
/// still intends to keep going (§4.5 robustness policy).
const IMPERATIVE_MARKERS: &[&str] = &[
    "i will",
    "i'll",
    "need to",
    "let me",
    "next i",
    "continuing",
];

/// Decide whether to continue (§4.5).
///
/// `directive` is the structured `continuation` object the model returned,
/// if any. `is_error_finish` marks a turn that ended in a `ModelError`
/// (§7: ModelError — "continuation may re-enter if the heuristic
/// triggers"). `visible_text` is the turn's user-visible text, inspected by
/// the robustness heuristic when there is no structured directive.
pub fn decide(
    visible_text: &str,
    directive: Option<&ContinuationDirective>,
    is_error_finish: bool,
    depth: usize,
    max_depth: usize,
) -> ContinuationDecision {
    if let Some(directive) = directive {
        if directive.status == ContinuationStatus::Continue && depth < max_depth {
            return ContinuationDecision::Reenter {
                message: synthesize_message(directive.reason.as_deref()),
                new_depth: depth + 1,
            };
        }
        return ContinuationDecision::Done;
    }

    if is_error_finish && depth < max_depth && looks_like_ongoing_intent(visible_text) {
        return ContinuationDecision::Reenter {
            message: synthesize_message(None),
            new_depth: depth + 1,
        };
    }

    ContinuationDecision::Done
}

fn synthesize_message(reason: Option<&str>) -> String {
    match reason {
        Some(reason) if !reason.trim().is_empty() => format!("Continue: {reason}"),
        _ => "Please continue".to_string(),
    }
}

fn looks_like_ongoing_intent(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    IMPERATIVE_MARKERS.iter().any(|marker| lower.contains(marker))
}
