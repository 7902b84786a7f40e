//! C1: Tool Registry + Tool Filter (§4.1, §3 Data Model: Tool,
//! ToolView).

pub mod builtin;
pub mod filter;
pub mod registry;
pub mod traits;

pub use builtin::{CheckMailTool, ReadFileTool, SendMailTool, SendMailWithSwitchTool};
pub use filter::{ToolFilterSpec, ToolView};
pub use registry::{ToolRegistry, ToolSpec};
pub use traits::{Tool, ToolContext, ToolInfo, ToolResult};

use std::sync::Arc;

use crate::mailbox::SharedMailbox;

/// Register the builtin mailbox tools and a workspace-scoped `read_file`
/// tool into `registry`.
pub fn register_builtin_tools(
    registry: &ToolRegistry,
    mailbox: SharedMailbox,
    workspace_root: impl Into<std::path::PathBuf>,
) {
    registry.register(Arc::new(SendMailTool::new(mailbox.clone())));
    registry.register(Arc::new(SendMailWithSwitchTool::new(mailbox.clone())));
    registry.register(Arc::new(CheckMailTool::new(mailbox)));
    registry.register(Arc::new(ReadFileTool::new(workspace_root)));
}
