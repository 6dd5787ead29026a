//! Buffered change channels.
//!
//! A channel hands the first change after each reset straight to an armed
//! receiver (the "live slot") and queues everything after it until a
//! poller drains the queue:
//!
//! - `reset` starts a new selection: queue cleared, live slot reopened,
//!   receiver detached, epoch advanced, children reset
//! - `arm` registers the receiver for the live slot
//! - `publish` / `publish_at` accept events from the producer thread
//! - `drain` returns what was queued since the previous drain
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use handbook::{
//!     BufferedChannel, ChangeEvent, ChangeKind, ChannelConfig, LiveHandle, ResourceTag,
//! };
//!
//! let channel = BufferedChannel::new(ResourceTag::BookList, ChannelConfig::default());
//! channel.reset();
//! let (sender, handle) = LiveHandle::pair();
//! channel.arm(Arc::new(sender));
//!
//! channel.publish(ChangeEvent::of(ChangeKind::Added, "b1", "Moby Dick", "books"));
//! channel.publish(ChangeEvent::of(ChangeKind::Added, "b2", "Dune", "books"));
//!
//! assert_eq!(handle.try_recv().unwrap().unwrap().entry.value, "Moby Dick");
//! assert_eq!(channel.drain()[0].entry.value, "Dune");
//! assert!(channel.drain().is_empty());
//! ```

mod buffered;
mod types;

pub use buffered::BufferedChannel;
pub use types::{ChangeReceiver, ChannelConfig, ChannelStats, Delivery, Epoch, LiveHandle, Publish};
