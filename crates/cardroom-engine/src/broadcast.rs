//! Where updates go once a session has changed.
//!
//! The engine hands each [`Update`] to a [`Broadcaster`] together with the
//! session's channel key (`room/<sessionId>`). Delivery, ordering, and
//! fan-out to sockets belong to the broadcaster.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use cardroom_protocol::Update;
use tokio::sync::broadcast;

/// Messages buffered per channel before slow subscribers start lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Receives every update the engine produces.
///
/// `publish` is fire-and-forget and must not block: it is called while the
/// router still holds the session's lock, so two updates for one session
/// are published in the order they were applied.
pub trait Broadcaster: Send + Sync + 'static {
    fn publish(&self, channel: &str, update: &Update);

    /// Called once a session is gone, after its final update if it had one.
    ///
    /// May be called more than once for the same channel, and for channels
    /// never published to. Default: nothing to clean up.
    fn forget(&self, _channel: &str) {}
}

// ---------------------------------------------------------------------------
// ChannelBroadcaster
// ---------------------------------------------------------------------------

/// An in-process broadcaster with one `tokio::sync::broadcast` channel per
/// channel key.
///
/// Updates published on a channel nobody has subscribed to are dropped.
///
/// ```rust
/// use cardroom_engine::{Broadcaster, ChannelBroadcaster};
/// use cardroom_protocol::{SessionId, Update};
///
/// let hub = ChannelBroadcaster::new();
/// let mut rx = hub.subscribe("room/s-1");
///
/// let update = Update {
///     session_id: SessionId::from("s-1"),
///     participants: Vec::new(),
///     revealed: false,
///     resetting: false,
/// };
/// hub.publish("room/s-1", &update);
/// assert_eq!(rx.try_recv().unwrap(), update);
/// ```
#[derive(Debug)]
pub struct ChannelBroadcaster {
    channels: Mutex<HashMap<String, broadcast::Sender<Update>>>,
    capacity: usize,
}

impl ChannelBroadcaster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// `capacity` is the per-channel buffer; values below 1 are raised to 1.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Subscribes to a channel, creating it if needed.
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<Update> {
        self.channels()
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Number of live subscribers on a channel.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels()
            .get(channel)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    // A panic while holding this lock cannot leave the map half-updated,
    // so a poisoned lock is still usable.
    fn channels(&self) -> MutexGuard<'_, HashMap<String, broadcast::Sender<Update>>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ChannelBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn publish(&self, channel: &str, update: &Update) {
        let channels = self.channels();
        let Some(sender) = channels.get(channel) else {
            tracing::trace!(channel, "no subscribers, update dropped");
            return;
        };
        if sender.send(update.clone()).is_err() {
            tracing::trace!(channel, "all subscribers gone, update dropped");
        }
    }

    /// Drops the channel. Existing receivers drain what is buffered and
    /// then see the channel closed.
    fn forget(&self, channel: &str) {
        self.channels().remove(channel);
    }
}
