//! Top-level error taxonomy (§7) and its mapping onto JSON-RPC error codes.

use thiserror::Error;

/// Standard JSON-RPC 2.0 error codes, plus the custom range used here.
pub mod rpc_code {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
    /// Custom: session/agent lookup failures.
    pub const NOT_FOUND: i64 = -32001;
}

/// Errors that can surface as a JSON-RPC error response. Tool/model errors
/// (§7: ToolExecutionError, ModelError, PromptNotFound, Cancellation) are
/// deliberately not represented here — they are handled inside the turn and
/// never become a client-visible RPC error.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("malformed JSON on the wire: {0}")]
    TransportParse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unknown method: {0}")]
    MethodNotFound(String),

    #[error("unknown session: {0}")]
    SessionNotFound(String),

    #[error("unknown agent: {0}")]
    AgentNotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RuntimeError {
    pub fn to_rpc_code(&self) -> i64 {
        match self {
            RuntimeError::TransportParse(_) => rpc_code::PARSE_ERROR,
            RuntimeError::InvalidRequest(_) => rpc_code::INVALID_REQUEST,
            RuntimeError::MethodNotFound(_) => rpc_code::METHOD_NOT_FOUND,
            RuntimeError::SessionNotFound(_) | RuntimeError::AgentNotFound(_) => {
                rpc_code::NOT_FOUND
            }
            RuntimeError::Internal(_) => rpc_code::INTERNAL_ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
