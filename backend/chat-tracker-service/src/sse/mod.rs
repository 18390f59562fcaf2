/// Server-Sent Events broadcasting
///
/// - `event`: event envelope and SSE wire framing
/// - `sink`: the write side of a subscriber connection
/// - `registry`: the shared `Broadcaster` and subscriber lifecycle
/// - `subscription`: per-connection frame stream used as a response body
/// - `heartbeat`: periodic keep-alive task
/// - `hangup`: connection hook that reports clients going away
pub mod event;
pub mod hangup;
pub mod heartbeat;
pub mod registry;
pub mod sink;
pub mod subscription;

pub use event::Event;
pub use hangup::{watch_peer, PeerHangup};
pub use heartbeat::spawn_heartbeat;
pub use registry::{BroadcastError, Broadcaster, Subscriber, SubscriberId, SubscriberState};
pub use sink::{EventSink, SinkError};
pub use subscription::Subscription;
