//! The external document store capability.
//!
//! The hosted store is modeled as a JSON tree addressed by [`StorePath`],
//! with per-path child listeners. Listeners are told about each direct
//! child of the watched node: once as `Added` for every child present when
//! they subscribe, then `Added`/`Changed`/`Removed` as writes land.

mod dispatch;
mod memory;

pub use memory::{MemoryStore, MemoryStoreConfig};

use crate::error::{ProducerError, Result};
use crate::types::{ChangeKind, StorePath};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Unique identifier for a child listener registration.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

impl fmt::Debug for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ListenerId({})", self.0)
    }
}

/// Receives child events for one watched path.
///
/// Invoked from the store's notification thread.
pub trait ChildListener: Send + Sync {
    /// A direct child of the watched node was added, changed or removed.
    /// For removals `value` is the child's last value.
    fn on_child(&self, kind: ChangeKind, key: &str, value: &Value);

    /// The store gave up on this listener. No further calls follow.
    fn on_cancelled(&self, error: ProducerError);
}

/// Read, write and watch access to the document tree.
pub trait DocumentStore: Send + Sync {
    /// Start watching the children of `path`.
    fn subscribe(&self, path: &StorePath, listener: Arc<dyn ChildListener>) -> Result<ListenerId>;

    /// Stop watching. Unknown ids are ignored.
    fn unsubscribe(&self, id: ListenerId);

    /// Current value at `path`, `None` if absent.
    fn read(&self, path: &StorePath) -> Result<Option<Value>>;

    /// Replace the value at `path`. Writing `Null` deletes.
    fn write(&self, path: &StorePath, value: Value) -> Result<()>;

    /// Remove the value at `path`. Removing an absent path succeeds.
    fn delete(&self, path: &StorePath) -> Result<()>;

    /// Store `value` under a freshly generated child key of `path`.
    fn append(&self, path: &StorePath, value: Value) -> Result<String>;
}
