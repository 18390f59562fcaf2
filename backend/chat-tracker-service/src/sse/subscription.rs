use super::registry::{Broadcaster, Subscriber, SubscriberId, SubscriberState};
use crate::metrics;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::sync::mpsc::UnboundedReceiver;

/// Frames destined for one SSE connection.
///
/// Used as the response body stream. Dropping the subscription removes it
/// from the broadcaster; the HTTP server does that once the response ends,
/// either because the peer hung up (see [`super::hangup`]) or because a write
/// to the connection failed. The stream ends once the broadcaster drops the
/// sender, which happens on eviction and on shutdown.
pub struct Subscription {
    subscriber: Subscriber,
    frames: UnboundedReceiver<Bytes>,
    broadcaster: Broadcaster,
    opened_at: Instant,
}

impl Subscription {
    pub(crate) fn new(
        subscriber: Subscriber,
        frames: UnboundedReceiver<Bytes>,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            subscriber,
            frames,
            broadcaster,
            opened_at: Instant::now(),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.subscriber.id()
    }

    pub fn state(&self) -> SubscriberState {
        self.subscriber.state()
    }
}

impl Stream for Subscription {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.frames.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.subscriber.begin_close();
        self.broadcaster.unsubscribe(self.subscriber.id());
        metrics::observe_sse_lifetime(self.opened_at.elapsed());
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.subscriber.id())
            .field("state", &self.subscriber.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sse::event::{Event, CONNECTED_FRAME, HEARTBEAT_FRAME};
    use futures::StreamExt;
    use serde_json::json;

    #[tokio::test]
    async fn test_connected_frame_comes_first() {
        let broadcaster = Broadcaster::new();
        let mut subscription = broadcaster.subscribe().unwrap();

        broadcaster.broadcast(&Event::new("ping", &json!({})).unwrap());

        assert_eq!(subscription.next().await.unwrap().as_ref(), CONNECTED_FRAME);
        assert_eq!(
            subscription.next().await.unwrap().as_ref(),
            b"data: {\"event\":\"ping\",\"data\":{}}\n\n"
        );
    }

    #[tokio::test]
    async fn test_frames_arrive_in_broadcast_order() {
        let broadcaster = Broadcaster::new();
        let mut subscription = broadcaster.subscribe().unwrap();
        let _ = subscription.next().await;

        for i in 0..5 {
            broadcaster.broadcast(&Event::new("tick", &i).unwrap());
        }
        broadcaster.heartbeat();

        for i in 0..5 {
            let frame = subscription.next().await.unwrap();
            let expected = format!("data: {{\"event\":\"tick\",\"data\":{}}}\n\n", i);
            assert_eq!(frame.as_ref(), expected.as_bytes());
        }
        assert_eq!(subscription.next().await.unwrap().as_ref(), HEARTBEAT_FRAME);
    }

    #[tokio::test]
    async fn test_drop_deregisters() {
        let broadcaster = Broadcaster::new();
        let subscription = broadcaster.subscribe().unwrap();
        let other = broadcaster.subscribe().unwrap();
        assert_eq!(broadcaster.len(), 2);

        drop(subscription);
        assert_eq!(broadcaster.len(), 1);
        assert_eq!(other.state(), SubscriberState::Open);
    }

    #[tokio::test]
    async fn test_shutdown_ends_stream() {
        let broadcaster = Broadcaster::new();
        let mut subscription = broadcaster.subscribe().unwrap();

        broadcaster.shutdown();

        // Already queued frames are still delivered, then the stream ends
        assert_eq!(subscription.next().await.unwrap().as_ref(), CONNECTED_FRAME);
        assert!(subscription.next().await.is_none());
        assert_eq!(subscription.state(), SubscriberState::Removed);
    }
}
