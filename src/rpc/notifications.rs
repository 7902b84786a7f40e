//! Server-to-client notifications (§6 "Notifications (server → client)").
//!
//! [`SessionBus`] is the concrete [`NotificationSink`] every session wires
//! its [`crate::agent::AgentLoop`] turns through; it is a thin wrapper over
//! a `tokio::sync::broadcast` channel carrying a tagged `ServerNotification`
//! union, the same shape as a typical event-bus-over-broadcast-channel
//! setup.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::channel::{ChannelMessage, NotificationSink};

/// Every notification variant named in §6, tagged by `type` for the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerNotification {
    StreamingChunk {
        content: String,
        session_id: String,
        agent_id: String,
        is_partial: bool,
        format: String,
    },
    ChannelMessage {
        #[serde(flatten)]
        message: ChannelMessage,
    },
    AgentCreated {
        session_id: String,
        agent_id: String,
    },
    AgentSwitched {
        session_id: String,
        from_agent: Option<String>,
        to_agent: String,
    },
    AgentMessage {
        session_id: String,
        agent_id: String,
        content: String,
    },
    ContextUpdated {
        session_id: String,
        agent_id: String,
    },
    ContextRefreshed {
        session_id: String,
        agent_id: String,
    },
    ContextCleared {
        session_id: String,
        agent_id: String,
    },
    ContinuationProgress {
        session_id: String,
        agent_id: String,
        iteration: usize,
        max_iterations: usize,
    },
    SessionSaved {
        session_id: String,
        path: String,
    },
    SessionLoaded {
        session_id: String,
        path: String,
    },
    SessionStatus {
        session_id: String,
        status: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Cancelled {
        session_id: String,
        agent_id: String,
    },
}

/// Per-session broadcast bus. Cloning is cheap (clones the sender handle);
/// every WebSocket connection subscribes its own receiver.
#[derive(Clone)]
pub struct SessionBus {
    sender: broadcast::Sender<ServerNotification>,
}

impl SessionBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerNotification> {
        self.sender.subscribe()
    }

    /// Publish directly; errors (no subscribers) are not a failure — a
    /// session with no attached peer still runs turns (e.g. async agents).
    pub fn publish(&self, notification: ServerNotification) {
        let _ = self.sender.send(notification);
    }
}

impl Default for SessionBus {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSink for SessionBus {
    fn deliver(&self, message: ChannelMessage) {
        let is_partial = message.metadata.is_partial;
        let notification = if is_partial {
            ServerNotification::StreamingChunk {
                content: message.content.clone(),
                session_id: message.metadata.session_id.clone(),
                agent_id: message.metadata.agent_id.clone(),
                is_partial: true,
                format: "text".to_string(),
            }
        } else {
            ServerNotification::ChannelMessage { message }
        };
        self.publish(notification);
    }
}
