//! # Handbook
//!
//! Change notifications for a real-time book/chapter document store.
//!
//! ## Core Concepts
//!
//! - **Channels**: one live slot per selection, a queue for everything after it
//! - **Feeds**: bind a store path to a channel for the life of one selection
//! - **Subscriptions**: book list, chapter list and chapter, resetting top-down
//! - **Store**: the document tree and its child-event stream
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use handbook::{Handbook, HandbookConfig, MemoryStore};
//!
//! let store = Arc::new(MemoryStore::new()?);
//! let handbook = Handbook::open(store.clone(), HandbookConfig::default())?;
//!
//! // Start watching the book list
//! let live = handbook.get_book_list()?;
//!
//! handbook.add_book("Moby Dick")?;
//! handbook.add_book("Dune")?;
//! store.flush()?;
//!
//! // The first change arrives live, the rest wait for a poll
//! let first = live.recv_timeout(Duration::from_secs(1)).unwrap()?;
//! assert_eq!(first.entry.value, "Moby Dick");
//! assert_eq!(handbook.poll_book_list()[0].entry.value, "Dune");
//! # Ok::<(), handbook::HandbookError>(())
//! ```

pub mod channel;
pub mod error;
pub mod handbook;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use channel::{
    BufferedChannel, ChangeReceiver, ChannelConfig, ChannelStats, Delivery, Epoch, LiveHandle,
    Publish,
};
pub use error::{HandbookError, ProducerError, Result};
pub use handbook::{Handbook, HandbookConfig};
pub use store::{ChildListener, DocumentStore, ListenerId, MemoryStore, MemoryStoreConfig};
pub use subscriptions::{ChannelFeed, SubscriptionManager};
pub use types::*;
