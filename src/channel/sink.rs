//! The live-delivery boundary the Agent Loop streams through (§9 Design
//! Notes: "the Agent Loop accepts a `NotificationSink` interface").
//!
//! [`crate::rpc::notifications`] provides the concrete implementation that
//! forwards to a session's JSON-RPC peer; tests use [`NullSink`].

use super::router::ChannelMessage;
use super::visibility::VisibilityPrefs;

/// Receives channel messages as the Agent Loop produces them, partial
/// chunks included. Implementations must not block the caller for long —
/// the loop calls `deliver` inline on the streaming hot path.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, message: ChannelMessage);
}

/// A sink that discards everything. Useful where a caller only needs the
/// batch of emitted messages `run_turn` returns and has no live peer to
/// forward to (unit tests, the async agent track which has no interactive
/// streaming surface, §4.11).
pub struct NullSink;

impl NotificationSink for NullSink {
    fn deliver(&self, _message: ChannelMessage) {}
}

/// Wraps another sink and drops messages [`VisibilityPrefs`] says the
/// client hasn't opted into (§4.4). `final` always passes through; the
/// wrapped sink still sees every partial chunk, since partials are only
/// ever emitted on the `final` channel (§4.4, §8 property 3).
pub struct VisibilityFilteredSink<'a> {
    inner: &'a dyn NotificationSink,
    visibility: VisibilityPrefs,
}

impl<'a> VisibilityFilteredSink<'a> {
    pub fn new(inner: &'a dyn NotificationSink, visibility: VisibilityPrefs) -> Self {
        Self { inner, visibility }
    }
}

impl<'a> NotificationSink for VisibilityFilteredSink<'a> {
    fn deliver(&self, message: ChannelMessage) {
        if self.visibility.allows(message.channel) {
            self.inner.deliver(message);
        }
    }
}
