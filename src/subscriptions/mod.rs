//! Selection-scoped subscriptions to the document store.
//!
//! Each of the three channels follows one store path at a time:
//! - book list: `{root}`
//! - chapter list: `{root}/{book}/chapters`
//! - chapter: `{root}/{book}/chapters/{chapter}`
//!
//! Selecting a path resets the channel (and the channels below it), drops
//! the previous feed and attaches a fresh one.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use handbook::{DocumentStore, LiveHandle, MemoryStore, StorePath, SubscriptionManager};
//! use serde_json::json;
//!
//! let store = Arc::new(MemoryStore::new()?);
//! store.write(&StorePath::parse("books/b1/name")?, json!("Moby Dick"))?;
//!
//! let manager = SubscriptionManager::new(store.clone());
//! let (sender, handle) = LiveHandle::pair();
//! manager.select_book_list(Arc::new(sender))?;
//! store.flush()?;
//!
//! assert_eq!(handle.try_recv().unwrap()?.entry.value, "Moby Dick");
//! assert!(manager.poll_book_list().is_empty());
//! # Ok::<(), handbook::HandbookError>(())
//! ```

mod feed;
mod manager;

pub use feed::ChannelFeed;
pub use manager::SubscriptionManager;
