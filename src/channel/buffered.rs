//! The buffered channel: one live slot per reset, a queue for the rest.

use crate::error::ProducerError;
use crate::types::{ChangeEvent, ResourceTag};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

use super::types::{ChangeReceiver, ChannelConfig, ChannelStats, Epoch, Publish};

/// Mutable channel state, guarded by the channel lock.
struct ChannelState {
    /// Events that arrived after the live slot was used, in arrival order.
    queue: VecDeque<ChangeEvent>,
    /// Number of queue entries already returned by `drain`.
    drained: usize,
    /// Whether the live slot has been used since the last reset.
    delivered: bool,
    receiver: Option<Arc<dyn ChangeReceiver>>,
    epoch: Epoch,
}

impl ChannelState {
    fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            drained: 0,
            delivered: false,
            receiver: None,
            epoch: Epoch::default(),
        }
    }
}

/// Delivers the first change after each reset to the armed receiver and
/// buffers every later change until a poller drains it.
///
/// Resetting a channel also resets its children, which models selections
/// scoped inside the parent's selection.
pub struct BufferedChannel {
    tag: ResourceTag,
    config: ChannelConfig,
    state: Mutex<ChannelState>,
    children: Vec<Arc<BufferedChannel>>,
}

impl BufferedChannel {
    /// Create a channel without children.
    pub fn new(tag: ResourceTag, config: ChannelConfig) -> Self {
        Self::with_children(tag, config, Vec::new())
    }

    /// Create a channel whose resets cascade to `children`.
    pub fn with_children(
        tag: ResourceTag,
        config: ChannelConfig,
        children: Vec<Arc<BufferedChannel>>,
    ) -> Self {
        Self {
            tag,
            config,
            state: Mutex::new(ChannelState::new()),
            children,
        }
    }

    /// Which resource this channel carries.
    pub fn tag(&self) -> ResourceTag {
        self.tag
    }

    /// Channels reset along with this one.
    pub fn children(&self) -> &[Arc<BufferedChannel>] {
        &self.children
    }

    /// Current reset generation.
    pub fn epoch(&self) -> Epoch {
        self.state.lock().epoch
    }

    /// Register or replace the live receiver.
    ///
    /// Arming does not deliver anything by itself; it only makes the next
    /// arriving event deliverable.
    pub fn arm(&self, receiver: Arc<dyn ChangeReceiver>) {
        let mut state = self.state.lock();
        if state.receiver.is_some() {
            debug!(channel = %self.tag, "replacing armed receiver");
        }
        state.receiver = Some(receiver);
    }

    /// Drop the live receiver, if any. Queue and live slot are kept.
    pub fn disarm(&self) -> bool {
        self.state.lock().receiver.take().is_some()
    }

    /// Clear the queue and the live slot, detach the receiver, and start a
    /// new epoch. Children are reset afterwards.
    ///
    /// Returns the epoch that feeds bound to the new selection must carry.
    pub fn reset(&self) -> Epoch {
        let epoch = {
            let mut state = self.state.lock();
            state.queue.clear();
            state.drained = 0;
            state.delivered = false;
            state.receiver = None;
            state.epoch = state.epoch.next();
            state.epoch
        };
        debug!(channel = %self.tag, epoch = epoch.0, "channel reset");

        for child in &self.children {
            child.reset();
        }
        epoch
    }

    /// Accept an event for the current epoch.
    pub fn publish(&self, event: ChangeEvent) -> Publish {
        let mut state = self.state.lock();
        self.publish_locked(&mut state, event)
    }

    /// Accept an event produced by a feed bound at `epoch`.
    ///
    /// Events from an earlier selection are discarded without touching state.
    pub fn publish_at(&self, epoch: Epoch, event: ChangeEvent) -> Publish {
        let mut state = self.state.lock();
        if state.epoch != epoch {
            debug!(
                channel = %self.tag,
                current = state.epoch.0,
                stale = epoch.0,
                key = %event.entry.key,
                "dropping event from superseded selection"
            );
            return Publish::Stale;
        }
        self.publish_locked(&mut state, event)
    }

    fn publish_locked(&self, state: &mut ChannelState, event: ChangeEvent) -> Publish {
        if !state.delivered {
            state.delivered = true;
            match &state.receiver {
                Some(receiver) => {
                    debug!(
                        channel = %self.tag,
                        kind = %event.kind,
                        key = %event.entry.key,
                        "live delivery"
                    );
                    receiver.on_change(event);
                    Publish::Live
                }
                None => {
                    debug!(
                        channel = %self.tag,
                        key = %event.entry.key,
                        "no receiver armed, live event dropped"
                    );
                    Publish::Skipped
                }
            }
        } else {
            state.queue.push_back(event.with_tag(self.tag));
            Publish::Buffered
        }
    }

    /// Hand a producer error to the armed receiver.
    ///
    /// Errors bypass the queue and leave the live slot as it was. Returns
    /// whether a receiver was there to take it.
    pub fn publish_error(&self, error: ProducerError) -> bool {
        let state = self.state.lock();
        self.publish_error_locked(&state, error)
    }

    /// Like [`publish_error`](Self::publish_error), for a feed bound at `epoch`.
    pub fn publish_error_at(&self, epoch: Epoch, error: ProducerError) -> bool {
        let state = self.state.lock();
        if state.epoch != epoch {
            debug!(channel = %self.tag, %error, "dropping error from superseded selection");
            return false;
        }
        self.publish_error_locked(&state, error)
    }

    fn publish_error_locked(&self, state: &ChannelState, error: ProducerError) -> bool {
        match &state.receiver {
            Some(receiver) => {
                warn!(channel = %self.tag, %error, "producer error");
                receiver.on_error(error);
                true
            }
            None => {
                warn!(channel = %self.tag, %error, "producer error with no receiver armed");
                false
            }
        }
    }

    /// Return the buffered events that no earlier drain has returned.
    ///
    /// Empty while the live slot is unused. The queue is kept until the next
    /// reset (subject to `retain_drained`), so draining twice with nothing
    /// new in between yields an empty batch the second time.
    pub fn drain(&self) -> Vec<ChangeEvent> {
        let mut state = self.state.lock();
        if !state.delivered {
            return Vec::new();
        }

        let batch: Vec<ChangeEvent> = state.queue.iter().skip(state.drained).cloned().collect();
        state.drained = state.queue.len();

        if let Some(limit) = self.config.retain_drained {
            let excess = state.drained.saturating_sub(limit);
            if excess > 0 {
                state.queue.drain(..excess);
                state.drained -= excess;
            }
        }
        batch
    }

    /// Every event currently held in the queue, drained or not.
    pub fn buffered(&self) -> Vec<ChangeEvent> {
        self.state.lock().queue.iter().cloned().collect()
    }

    /// Whether the live slot has been used since the last reset.
    pub fn is_delivered(&self) -> bool {
        self.state.lock().delivered
    }

    /// Whether a live receiver is registered.
    pub fn is_armed(&self) -> bool {
        self.state.lock().receiver.is_some()
    }

    /// Snapshot of the channel state.
    pub fn stats(&self) -> ChannelStats {
        let state = self.state.lock();
        ChannelStats {
            tag: self.tag,
            epoch: state.epoch,
            delivered: state.delivered,
            armed: state.receiver.is_some(),
            buffered: state.queue.len(),
            pending: state.queue.len() - state.drained,
        }
    }
}
