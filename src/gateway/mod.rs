//! [AMBIENT] JSON-RPC/WebSocket gateway (§6 "Transport
//! implementation"). Feature-gated behind `gateway`; the core runtime in
//! [`crate::session`]/[`crate::rpc`] has no dependency on this module.
//!
//! A public `/health` route outside any upgrade, a single `/ws` route
//! running the JSON-RPC dispatcher over one `axum::extract::ws::WebSocket`
//! per connection, and a PID-file-guarded daemon bootstrap with port
//! fallback. No auth middleware is carried — this runtime has no
//! multi-tenant auth story (§1 Non-goals).

pub mod daemon;
pub mod routes;
pub mod ws;

pub use daemon::{run, GatewayState};
