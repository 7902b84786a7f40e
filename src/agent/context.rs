//! An agent's ordered message history (§3 Data Model: Context).
//!
//! Invariants enforced here: the first message is the system prompt when
//! present; truncation never removes it.

use crate::model::{Message, MessageRole};

/// An agent's conversation history. Mutated only under the owning session's
/// turn lock (§5).
#[derive(Debug, Clone, Default)]
pub struct Context {
    messages: Vec<Message>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a fresh context with a system prompt.
    pub fn with_system_prompt(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Clear all messages, re-seeding the system prompt if one was present
    /// (`/clear`, §4.9).
    pub fn clear(&mut self) {
        let system = self.messages.first().and_then(|m| {
            (m.role == MessageRole::System).then(|| m.content.clone())
        });
        self.messages.clear();
        if let Some(prompt) = system {
            self.messages.push(Message::system(prompt));
        }
    }

    /// Replace the leading system message in place (used when `/debug`
    /// rebuilds the active agent's prompt, §4.9).
    pub fn set_system_prompt(&mut self, system_prompt: impl Into<String>) {
        if let Some(first) = self.messages.first_mut()
            && first.role == MessageRole::System
        {
            first.content = system_prompt.into();
        } else {
            self.messages.insert(0, Message::system(system_prompt));
        }
    }

    /// Truncate to at most `max_messages`, keeping the leading system
    /// message (if any) untouched and dropping the oldest non-system
    /// messages first (§3 Context invariant: "truncation ... never removes
    /// the system message").
    pub fn truncate(&mut self, max_messages: usize) {
        if self.messages.len() <= max_messages {
            return;
        }
        let has_system = self
            .messages
            .first()
            .map(|m| m.role == MessageRole::System)
            .unwrap_or(false);

        if has_system {
            let keep_tail = max_messages.saturating_sub(1);
            let drop_end = self.messages.len().saturating_sub(keep_tail);
            if drop_end > 1 {
                self.messages.drain(1..drop_end);
            }
        } else {
            let drop_end = self.messages.len() - max_messages;
            self.messages.drain(0..drop_end);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_reseeds_system_prompt() {
        let mut ctx = Context::with_system_prompt("be helpful");
        ctx.push(Message::user("hi"));
        ctx.push(Message::assistant("hello"));
        ctx.clear();
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.messages()[0].content, "be helpful");
    }

    #[test]
    fn truncate_never_drops_system_message() {
        let mut ctx = Context::with_system_prompt("system");
        for i in 0..10 {
            ctx.push(Message::user(format!("msg {i}")));
        }
        ctx.truncate(5);
        assert_eq!(ctx.len(), 5);
        assert_eq!(ctx.messages()[0].role, MessageRole::System);
        assert_eq!(ctx.messages()[0].content, "system");
    }

    #[test]
    fn truncate_no_op_under_limit() {
        let mut ctx = Context::with_system_prompt("system");
        ctx.push(Message::user("hi"));
        ctx.truncate(10);
        assert_eq!(ctx.len(), 2);
    }
}
