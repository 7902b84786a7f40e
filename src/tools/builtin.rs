//! Builtin tools shipped with the runtime: the mailbox-facing
//! `send_mail`/`send_mail_with_switch`/`check_mail` trio the Switch Handler
//! (C8) and mail-notification annotator depend on, plus a minimal
//! workspace-scoped `read_file` leaf tool (§1: "file-system tools ... each
//! is a leaf tool behind the registry's uniform interface"), grounded on
//! `original_source/tools/read_file_tool.py`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::mailbox::{MailDraft, Priority, SharedMailbox};

use super::traits::{Tool, ToolResult};

fn parse_priority(args: &Value) -> Priority {
    match args.get("priority").and_then(Value::as_str) {
        Some("low") => Priority::Low,
        Some("high") => Priority::High,
        Some("urgent") => Priority::Urgent,
        _ => Priority::Normal,
    }
}

/// `send_mail`: deliver mail to another agent without switching control.
pub struct SendMailTool {
    mailbox: SharedMailbox,
}

impl SendMailTool {
    pub fn new(mailbox: SharedMailbox) -> Self {
        Self { mailbox }
    }
}

#[async_trait]
impl Tool for SendMailTool {
    fn name(&self) -> &str {
        "send_mail"
    }

    fn description(&self) -> &str {
        "Send a mail message to another agent's mailbox without transferring control."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "to_agent": {"type": "string"},
                "subject": {"type": "string"},
                "body": {"type": "string"},
                "priority": {"type": "string", "enum": ["low", "normal", "high", "urgent"]},
            },
            "required": ["to_agent", "subject", "body"],
        })
    }

    fn category(&self) -> &str {
        "mailbox"
    }

    fn tags(&self) -> &[&str] {
        &["mailbox", "communication"]
    }

    async fn execute(&self, args: Value, ctx: &super::traits::ToolContext) -> ToolResult {
        let Some(to_agent) = args.get("to_agent").and_then(Value::as_str) else {
            return ToolResult::err("'to_agent' argument is missing.");
        };
        let subject = args.get("subject").and_then(Value::as_str).unwrap_or("");
        let body = args.get("body").and_then(Value::as_str).unwrap_or("");

        let id = self.mailbox.send(MailDraft {
            from_agent: ctx.agent_id.clone(),
            to_agent: to_agent.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            priority: parse_priority(&args),
            metadata: Value::Null,
        });

        ToolResult::ok(format!("Mail sent to {to_agent} (id={id})"))
    }
}

/// `send_mail_with_switch`: deliver mail and request a synchronous agent
/// switch (§4.8). The tool itself only reports success and the resolved
/// `switch_to_agent` hint — the Switch Handler performs the actual switch
/// after tool execution.
pub struct SendMailWithSwitchTool {
    mailbox: SharedMailbox,
}

impl SendMailWithSwitchTool {
    pub fn new(mailbox: SharedMailbox) -> Self {
        Self { mailbox }
    }
}

#[async_trait]
impl Tool for SendMailWithSwitchTool {
    fn name(&self) -> &str {
        "send_mail_with_switch"
    }

    fn description(&self) -> &str {
        "Send a mail message to another agent and synchronously switch control to them."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "to_agent": {"type": "string"},
                "subject": {"type": "string"},
                "body": {"type": "string"},
                "priority": {"type": "string", "enum": ["low", "normal", "high", "urgent"]},
            },
            "required": ["to_agent", "subject", "body"],
        })
    }

    fn category(&self) -> &str {
        "mailbox"
    }

    fn tags(&self) -> &[&str] {
        &["mailbox", "communication", "switch"]
    }

    async fn execute(&self, args: Value, ctx: &super::traits::ToolContext) -> ToolResult {
        let Some(to_agent) = args.get("to_agent").and_then(Value::as_str) else {
            return ToolResult::err("'to_agent' argument is missing.");
        };
        let subject = args.get("subject").and_then(Value::as_str).unwrap_or("");
        let body = args.get("body").and_then(Value::as_str).unwrap_or("");

        let id = self.mailbox.send(MailDraft {
            from_agent: ctx.agent_id.clone(),
            to_agent: to_agent.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            priority: parse_priority(&args),
            metadata: Value::Null,
        });

        ToolResult::ok(format!("Mail sent to {to_agent} (id={id})"))
            .with_switch_to_agent(to_agent.to_string())
    }
}

/// `check_mail`: read and mark-read an agent's unread mailbox.
pub struct CheckMailTool {
    mailbox: SharedMailbox,
}

impl CheckMailTool {
    pub fn new(mailbox: SharedMailbox) -> Self {
        Self { mailbox }
    }
}

#[async_trait]
impl Tool for CheckMailTool {
    fn name(&self) -> &str {
        "check_mail"
    }

    fn description(&self) -> &str {
        "Check and read this agent's unread mailbox messages."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "agent_id": {"type": "string", "description": "Defaults to the calling agent."},
            },
        })
    }

    fn category(&self) -> &str {
        "mailbox"
    }

    fn tags(&self) -> &[&str] {
        &["mailbox", "communication"]
    }

    async fn execute(&self, args: Value, ctx: &super::traits::ToolContext) -> ToolResult {
        let agent_id = args
            .get("agent_id")
            .and_then(Value::as_str)
            .unwrap_or(ctx.agent_id.as_str());
        let mail = self.mailbox.check(agent_id);
        if mail.is_empty() {
            return ToolResult::ok("No unread messages.");
        }
        let lines: Vec<String> = mail
            .iter()
            .map(|m| format!("From {}: {} — {}", m.from_agent, m.subject, m.body))
            .collect();
        ToolResult::ok(lines.join("\n"))
    }
}

/// `read_file`: reads a file within a fixed workspace root.
pub struct ReadFileTool {
    workspace_root: PathBuf,
}

impl ReadFileTool {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
        }
    }

    fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let candidate = self.workspace_root.join(relative);
        let canonical = candidate.canonicalize().ok()?;
        let root = self.workspace_root.canonicalize().ok()?;
        canonical.starts_with(&root).then_some(canonical)
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Reads the content of a file within the workspace directory."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "start_line": {"type": "integer"},
                "end_line": {"type": "integer"},
            },
            "required": ["path"],
        })
    }

    fn category(&self) -> &str {
        "file_system"
    }

    fn tags(&self) -> &[&str] {
        &["filesystem", "file_read", "analysis"]
    }

    async fn execute(&self, args: Value, _ctx: &super::traits::ToolContext) -> ToolResult {
        let Some(path_str) = args.get("path").and_then(Value::as_str) else {
            return ToolResult::err("'path' argument is missing.");
        };

        let Some(path) = self.resolve(path_str) else {
            return ToolResult::err(format!(
                "Access denied: '{path_str}' is outside the workspace directory."
            ));
        };

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) => return ToolResult::err(format!("Failed to read '{path_str}': {e}")),
        };

        let start_line = args.get("start_line").and_then(Value::as_u64);
        let end_line = args.get("end_line").and_then(Value::as_u64);
        if start_line.is_none() && end_line.is_none() {
            return ToolResult::ok(content);
        }

        let lines: Vec<&str> = content.lines().collect();
        let start = start_line.map(|n| n.saturating_sub(1) as usize).unwrap_or(0);
        let end = end_line.map(|n| n as usize).unwrap_or(lines.len()).min(lines.len());
        if start >= end {
            return ToolResult::ok(String::new());
        }
        ToolResult::ok(lines[start..end].join("\n"))
    }
}

/// Resolve `relative` against `workspace_root` for the `@path` reference
/// syntax (§4.9, §6 "File-reference syntax"). Returns `None` if the file
/// does not exist — callers leave the reference as literal text in that
/// case.
pub fn read_workspace_file(workspace_root: &Path, relative: &str) -> Option<String> {
    let candidate = workspace_root.join(relative);
    std::fs::read_to_string(candidate).ok()
}
