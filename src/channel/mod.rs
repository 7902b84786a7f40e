//! C4: Channel Router (§4.4, §3 Data Model: ChannelMessage).
//!
//! Parses a [`crate::model::ModelTurnResult`] (or a raw streaming delta)
//! into ordered `{analysis, commentary, final}` messages, enforces that
//! only `final` content reaches the user mid-stream, and stamps a
//! per-session monotonic sequence number on every emission.

pub mod router;
pub mod sink;
pub mod visibility;

pub use router::{ChannelKind, ChannelMessage, ChannelMessageMetadata, ChannelRouter, StreamAccumulator, StreamDecision};
pub use sink::{NotificationSink, NullSink, VisibilityFilteredSink};
pub use visibility::VisibilityPrefs;
