//! JSON-RPC 2.0 transport layer (§6): envelope types, the method
//! dispatcher, and [`notifications`] (the server -> client notification
//! wire types and [`notifications::SessionBus`]).

pub mod dispatch;
pub mod notifications;

pub use dispatch::{Dispatcher, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use notifications::ServerNotification;
