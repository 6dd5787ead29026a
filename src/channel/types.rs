//! Types shared by buffered channels and their receivers.

use crate::error::ProducerError;
use crate::types::{ChangeEvent, ResourceTag};
use crossbeam_channel::{unbounded, Sender};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Outcome handed to a live receiver.
pub type Delivery = std::result::Result<ChangeEvent, ProducerError>;

/// Target of live deliveries on a channel.
///
/// Called with the channel lock held, so implementations must return
/// promptly and must not call back into the same channel.
pub trait ChangeReceiver: Send + Sync {
    /// The event occupying the channel's live slot.
    fn on_change(&self, event: ChangeEvent);

    /// A stream failure reported by the document store.
    fn on_error(&self, error: ProducerError);
}

impl ChangeReceiver for Sender<Delivery> {
    fn on_change(&self, event: ChangeEvent) {
        if self.send(Ok(event)).is_err() {
            tracing::debug!("live receiver hung up before delivery");
        }
    }

    fn on_error(&self, error: ProducerError) {
        if self.send(Err(error)).is_err() {
            tracing::debug!("live receiver hung up before error delivery");
        }
    }
}

/// Consumer side of a live delivery pair.
pub struct LiveHandle {
    /// Channel to receive live deliveries.
    pub receiver: crossbeam_channel::Receiver<Delivery>,
}

impl LiveHandle {
    /// Create a connected sender/handle pair.
    pub fn pair() -> (Sender<Delivery>, LiveHandle) {
        let (sender, receiver) = unbounded();
        (sender, LiveHandle { receiver })
    }

    /// Receive the next delivery (blocking).
    pub fn recv(&self) -> Result<Delivery, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a delivery (non-blocking).
    pub fn try_recv(&self) -> Result<Delivery, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> Result<Delivery, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

impl fmt::Debug for LiveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveHandle")
            .field("pending", &self.receiver.len())
            .finish()
    }
}

/// Configuration for a buffered channel.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// How many already-drained events to keep in the queue.
    /// Default: None (keep everything until the next reset).
    pub retain_drained: Option<usize>,
}

/// Reset generation of a channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(pub u64);

impl Epoch {
    pub fn next(self) -> Self {
        Epoch(self.0 + 1)
    }
}

/// What `publish` did with an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Publish {
    /// Handed to the armed receiver.
    Live,
    /// Took the live slot but no receiver was armed.
    Skipped,
    /// Appended to the queue.
    Buffered,
    /// Belonged to an earlier epoch and was discarded.
    Stale,
}

/// Point-in-time view of a channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelStats {
    pub tag: ResourceTag,
    pub epoch: Epoch,
    pub delivered: bool,
    pub armed: bool,
    /// Events currently held in the queue.
    pub buffered: usize,
    /// Events not yet returned by a drain.
    pub pending: usize,
}
