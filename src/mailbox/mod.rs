//! C2: the process-wide mailbox (§4.2).
//!
//! A single, thread-safe, process-global store of named message queues
//! between agents (and the user, by convention `from == "user"`). Delivery
//! is explicit: agents call `check` to read and mark mail as read rather
//! than having it pushed to them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Mail priority (§3: `priority ∈ {low, normal, high, urgent}`). Ordered so
/// that `Urgent > High > Normal > Low` for the `check` sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl std::str::FromStr for Priority {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            _ => Err(()),
        }
    }
}

/// One piece of mail (§3 Data Model: Mail).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mail {
    pub id: String,
    pub from_agent: String,
    pub to_agent: String,
    pub subject: String,
    pub body: String,
    pub priority: Priority,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

/// A draft mail submitted via `send`; the registry assigns `id`/`created_at`.
#[derive(Debug, Clone)]
pub struct MailDraft {
    pub from_agent: String,
    pub to_agent: String,
    pub subject: String,
    pub body: String,
    pub priority: Priority,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Default)]
struct Queue {
    mail: Vec<Mail>,
    unread_count: usize,
}

/// The process-wide mailbox. Shared across all sessions; guarded by a
/// single coarse mutex since it is not a hot path (§5).
#[derive(Default)]
pub struct Mailbox {
    queues: Mutex<HashMap<String, Queue>>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `draft` to the recipient's queue and return the generated id.
    pub fn send(&self, draft: MailDraft) -> String {
        let id = Uuid::new_v4().to_string();
        let mail = Mail {
            id: id.clone(),
            from_agent: draft.from_agent,
            to_agent: draft.to_agent.clone(),
            subject: draft.subject,
            body: draft.body,
            priority: draft.priority,
            metadata: draft.metadata,
            created_at: Utc::now(),
            read: false,
        };
        let mut queues = self.queues.lock().expect("mailbox lock poisoned");
        let queue = queues.entry(draft.to_agent).or_default();
        queue.mail.push(mail);
        queue.unread_count += 1;
        id
    }

    /// Return all unread mail for `agent_id`, marking it read, sorted
    /// highest-priority-first then FIFO within a priority class (§4.2,
    /// §8 property 8). This is atomic per agent: no interleaving can
    /// return the same mail twice to the same caller.
    pub fn check(&self, agent_id: &str) -> Vec<Mail> {
        let mut queues = self.queues.lock().expect("mailbox lock poisoned");
        let Some(queue) = queues.get_mut(agent_id) else {
            return Vec::new();
        };

        let mut unread: Vec<usize> = queue
            .mail
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.read)
            .map(|(i, _)| i)
            .collect();
        // Stable sort descending by priority; ties keep original (FIFO) order.
        unread.sort_by(|&a, &b| queue.mail[b].priority.cmp(&queue.mail[a].priority));

        let mut result = Vec::with_capacity(unread.len());
        for idx in unread {
            queue.mail[idx].read = true;
            result.push(queue.mail[idx].clone());
        }
        queue.unread_count = queue.unread_count.saturating_sub(result.len());
        result
    }

    pub fn has_unread(&self, agent_id: &str) -> bool {
        self.unread_count(agent_id) > 0
    }

    pub fn unread_count(&self, agent_id: &str) -> usize {
        let queues = self.queues.lock().expect("mailbox lock poisoned");
        queues.get(agent_id).map(|q| q.unread_count).unwrap_or(0)
    }

    /// Test-harness helper: purge an agent's queue entirely (§4.2: "clear
    /// (agent_id) (optional) for test harness").
    pub fn clear(&self, agent_id: &str) {
        let mut queues = self.queues.lock().expect("mailbox lock poisoned");
        queues.remove(agent_id);
    }
}

/// Convenience alias used where a mailbox is shared between the Switch
/// Handler, builtin tools, and the mail-notification annotator.
pub type SharedMailbox = Arc<Mailbox>;

/// Append a short mail-count notice to `response` if `agent_id` has unread
/// mail (§4 [SUPPLEMENT], grounded on
/// `original_source/agents/mail_notification.py`'s
/// `add_mail_notification_to_response`). Called after a plain (non-switch)
/// `send_mail` succeeds; a pure post-processing step, not a mixin. Emoji
/// markers from the source are dropped to match this codebase's plain-ASCII
/// user-facing strings.
pub fn annotate(response: &str, mailbox: &Mailbox, agent_id: &str) -> String {
    let count = mailbox.unread_count(agent_id);
    if count == 0 {
        return response.to_string();
    }
    let notice = if count == 1 {
        "You have 1 unread message in your mailbox.".to_string()
    } else {
        format!("You have {count} unread messages in your mailbox.")
    };
    if response.trim().is_empty() {
        notice
    } else {
        format!("{response}\n\n{notice}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(to: &str, priority: Priority) -> MailDraft {
        MailDraft {
            from_agent: "a".to_string(),
            to_agent: to.to_string(),
            subject: "subj".to_string(),
            body: "body".to_string(),
            priority,
            metadata: serde_json::Value::Null,
        }
    }

    #[test]
    fn check_marks_read_and_is_idempotent() {
        let mailbox = Mailbox::new();
        mailbox.send(draft("p", Priority::Normal));
        assert!(mailbox.has_unread("p"));
        let first = mailbox.check("p");
        assert_eq!(first.len(), 1);
        assert!(!mailbox.has_unread("p"));
        let second = mailbox.check("p");
        assert!(second.is_empty(), "mail must not be returned twice");
    }

    #[test]
    fn check_sorts_by_priority_then_fifo() {
        let mailbox = Mailbox::new();
        mailbox.send(draft("p", Priority::Low));
        mailbox.send(draft("p", Priority::Urgent));
        mailbox.send(draft("p", Priority::Normal));
        mailbox.send(draft("p", Priority::Urgent));

        let mail = mailbox.check("p");
        let priorities: Vec<Priority> = mail.iter().map(|m| m.priority).collect();
        assert_eq!(
            priorities,
            vec![Priority::Urgent, Priority::Urgent, Priority::Normal, Priority::Low]
        );
    }

    #[test]
    fn unknown_agent_has_no_mail() {
        let mailbox = Mailbox::new();
        assert!(!mailbox.has_unread("ghost"));
        assert_eq!(mailbox.unread_count("ghost"), 0);
        assert!(mailbox.check("ghost").is_empty());
    }

    #[test]
    fn annotate_appends_singular_and_plural_notices() {
        let mailbox = Mailbox::new();
        mailbox.send(draft("p", Priority::Normal));
        let out = annotate("hello", &mailbox, "p");
        assert_eq!(out, "hello\n\nYou have 1 unread message in your mailbox.");

        mailbox.send(draft("p", Priority::Normal));
        mailbox.send(draft("p", Priority::Normal));
        let out = annotate("hi again", &mailbox, "p");
        assert_eq!(out, "hi again\n\nYou have 3 unread messages in your mailbox.");
    }

    #[test]
    fn annotate_is_noop_without_unread_mail() {
        let mailbox = Mailbox::new();
        assert_eq!(annotate("hello", &mailbox, "p"), "hello");
    }
}
