/// Subscriber registry and fan-out
///
/// One `Broadcaster` is created at startup and shared by handle between the
/// SSE endpoint (which registers subscribers) and request handlers that
/// produce events. Registration, removal, fan-out and shutdown all run under
/// a single mutex so the registry is never iterated while being mutated.
use super::event::{Event, CONNECTED_FRAME, HEARTBEAT_FRAME};
use super::sink::EventSink;
use super::subscription::Subscription;
use crate::metrics::{self, DisconnectReason};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::unbounded_channel;
use tracing::{debug, info};
use uuid::Uuid;

/// Unique identifier assigned to a subscriber at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle of a subscriber: `Open -> Closing -> Removed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    /// Eligible for delivery
    Open,
    /// Connection signalled termination; removal in progress
    Closing,
    /// Deregistered. Terminal.
    Removed,
}

#[derive(Debug)]
struct StateCell(AtomicU8);

impl StateCell {
    const OPEN: u8 = 0;
    const CLOSING: u8 = 1;
    const REMOVED: u8 = 2;

    fn new() -> Self {
        Self(AtomicU8::new(Self::OPEN))
    }

    fn get(&self) -> SubscriberState {
        match self.0.load(Ordering::Acquire) {
            Self::OPEN => SubscriberState::Open,
            Self::CLOSING => SubscriberState::Closing,
            _ => SubscriberState::Removed,
        }
    }

    /// Open -> Closing. Never moves a removed subscriber backwards.
    fn begin_close(&self) {
        let _ = self.0.compare_exchange(
            Self::OPEN,
            Self::CLOSING,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    fn remove(&self) {
        self.0.store(Self::REMOVED, Ordering::Release);
    }
}

/// Handle to one registered subscriber.
///
/// The handle does not own the connection; it only identifies the registry
/// entry and observes its state.
#[derive(Debug, Clone)]
pub struct Subscriber {
    id: SubscriberId,
    state: Arc<StateCell>,
}

impl Subscriber {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn state(&self) -> SubscriberState {
        self.state.get()
    }

    pub fn is_open(&self) -> bool {
        self.state() == SubscriberState::Open
    }

    pub(crate) fn begin_close(&self) {
        self.state.begin_close();
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BroadcastError {
    #[error("broadcaster is shutting down")]
    ShuttingDown,
}

struct Slot {
    sink: Box<dyn EventSink>,
    state: Arc<StateCell>,
}

#[derive(Default)]
struct Registry {
    subscribers: HashMap<SubscriberId, Slot>,
    shutting_down: bool,
}

/// Fan-out of server-sent events to every connected client
#[derive(Clone, Default)]
pub struct Broadcaster {
    registry: Arc<Mutex<Registry>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new SSE client.
    ///
    /// The returned [`Subscription`] yields the frames to write to the
    /// connection, starting with `: connected`. Dropping it deregisters the
    /// subscriber.
    pub fn subscribe(&self) -> Result<Subscription, BroadcastError> {
        let (tx, rx) = unbounded_channel();
        // Queued before registration so it always precedes broadcast frames
        let _ = tx.send(Bytes::from_static(CONNECTED_FRAME));

        let subscriber = self.subscribe_sink(tx)?;
        Ok(Subscription::new(subscriber, rx, self.clone()))
    }

    /// Register an arbitrary sink. The caller is responsible for calling
    /// [`Broadcaster::unsubscribe`] when the underlying connection closes.
    pub fn subscribe_sink<S: EventSink>(&self, sink: S) -> Result<Subscriber, BroadcastError> {
        let subscriber = Subscriber {
            id: SubscriberId::new(),
            state: Arc::new(StateCell::new()),
        };

        let total = {
            let mut registry = self.registry.lock();
            if registry.shutting_down {
                drop(registry);
                metrics::record_sse_connection(false);
                return Err(BroadcastError::ShuttingDown);
            }
            registry.subscribers.insert(
                subscriber.id,
                Slot {
                    sink: Box::new(sink),
                    state: subscriber.state.clone(),
                },
            );
            registry.subscribers.len()
        };

        metrics::record_sse_connection(true);
        metrics::set_sse_subscribers(total);
        debug!(subscriber_id = %subscriber.id, total, "SSE subscriber registered");

        Ok(subscriber)
    }

    /// Remove a subscriber. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = {
            let mut registry = self.registry.lock();
            registry
                .subscribers
                .remove(&id)
                .map(|slot| (slot, registry.subscribers.len()))
        };

        match removed {
            Some((slot, total)) => {
                slot.state.begin_close();
                slot.state.remove();
                metrics::record_sse_disconnects(DisconnectReason::Client, 1);
                metrics::set_sse_subscribers(total);
                debug!(subscriber_id = %id, remaining = total, "SSE subscriber removed");
                true
            }
            None => false,
        }
    }

    /// Deliver `event` to every subscriber registered at the time of the call.
    ///
    /// Returns how many subscribers accepted the frame. Subscribers whose sink
    /// fails are removed; the failure is never surfaced to the producer.
    pub fn broadcast(&self, event: &Event) -> usize {
        let delivered = self.fan_out(event.frame());
        metrics::record_sse_event(event.name());
        debug!(event = event.name(), delivered, "SSE event broadcast");
        delivered
    }

    /// Write a keep-alive comment to every subscriber, with the same cleanup
    /// rules as [`Broadcaster::broadcast`].
    pub fn heartbeat(&self) -> usize {
        self.fan_out(&Bytes::from_static(HEARTBEAT_FRAME))
    }

    /// Refuse new subscribers and close every open one.
    ///
    /// Dropping the sinks ends each subscription stream, which lets the HTTP
    /// server finish the responses. Returns the number of subscribers closed;
    /// calling it again is a no-op.
    pub fn shutdown(&self) -> usize {
        let drained: Vec<Slot> = {
            let mut registry = self.registry.lock();
            if registry.shutting_down {
                return 0;
            }
            registry.shutting_down = true;
            registry.subscribers.drain().map(|(_, slot)| slot).collect()
        };

        for slot in &drained {
            slot.state.begin_close();
            slot.state.remove();
        }

        metrics::record_sse_disconnects(DisconnectReason::Shutdown, drained.len());
        metrics::set_sse_subscribers(0);
        info!(closed = drained.len(), "SSE broadcaster shut down");
        drained.len()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.registry.lock().shutting_down
    }

    /// Number of live subscribers
    pub fn len(&self) -> usize {
        self.registry.lock().subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn fan_out(&self, frame: &Bytes) -> usize {
        let mut delivered = 0;

        let (evicted, remaining) = {
            let mut registry = self.registry.lock();
            let before = registry.subscribers.len();

            registry.subscribers.retain(|id, slot| {
                match slot.sink.send_frame(frame.clone()) {
                    Ok(()) => {
                        delivered += 1;
                        true
                    }
                    Err(e) => {
                        slot.state.begin_close();
                        slot.state.remove();
                        debug!(subscriber_id = %id, error = %e, "Dropping SSE subscriber");
                        false
                    }
                }
            });

            let after = registry.subscribers.len();
            (before - after, after)
        };

        if evicted > 0 {
            metrics::record_sse_disconnects(DisconnectReason::WriteFailed, evicted);
            metrics::set_sse_subscribers(remaining);
            debug!(evicted, remaining, "Cleaned up dead SSE subscribers");
        }

        delivered
    }
}

impl fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.lock();
        f.debug_struct("Broadcaster")
            .field("subscribers", &registry.subscribers.len())
            .field("shutting_down", &registry.shutting_down)
            .finish()
    }
}
