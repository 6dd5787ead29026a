//! In-memory document store with child-event notifications.

use crate::error::{HandbookError, ProducerError, Result};
use crate::types::{ChangeKind, StorePath, Timestamp};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use super::dispatch::{Dispatcher, Job, Target};
use super::{ChildListener, DocumentStore, ListenerId};

/// Configuration for [`MemoryStore`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryStoreConfig {
    /// Name of the notification thread.
    pub dispatcher_name: String,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            dispatcher_name: "handbook-dispatch".to_string(),
        }
    }
}

struct Registration {
    path: StorePath,
    target: Target,
}

/// A JSON document tree kept in memory.
///
/// Behaves like the hosted store as seen through its streaming API:
/// listeners get an initial `Added` per existing child, then diffs of the
/// watched node's children as writes commit. Callbacks run on a background
/// thread in commit order; call [`flush`](Self::flush) to wait for them.
pub struct MemoryStore {
    tree: Mutex<Value>,
    listeners: RwLock<HashMap<ListenerId, Registration>>,
    next_listener: AtomicU64,
    next_push: AtomicU64,
    dispatcher: Dispatcher,
}

impl MemoryStore {
    /// Start a store with the default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(MemoryStoreConfig::default())
    }

    /// Start a store and its notification thread.
    pub fn with_config(config: MemoryStoreConfig) -> Result<Self> {
        let dispatcher = Dispatcher::spawn(&config.dispatcher_name)?;
        info!(dispatcher = %config.dispatcher_name, "memory store started");
        Ok(Self {
            tree: Mutex::new(Value::Object(Map::new())),
            listeners: RwLock::new(HashMap::new()),
            next_listener: AtomicU64::new(1),
            next_push: AtomicU64::new(Timestamp::now().0.max(0) as u64),
            dispatcher,
        })
    }

    /// Block until every notification for already-committed writes has been
    /// handed to its listener.
    pub fn flush(&self) -> Result<()> {
        self.dispatcher.flush()
    }

    /// Cancel every listener watching `path` or anything below it.
    ///
    /// Each is unregistered at once and gets `on_cancelled(error)` after the
    /// events already queued for it. Returns how many listeners were cancelled.
    pub fn cancel(&self, path: &StorePath, error: ProducerError) -> Result<usize> {
        let mut listeners = self.listeners.write();
        let ids: Vec<ListenerId> = listeners
            .iter()
            .filter(|(_, reg)| path.is_prefix_of(&reg.path))
            .map(|(id, _)| *id)
            .collect();

        for id in &ids {
            if let Some(reg) = listeners.remove(id) {
                self.dispatcher.send(Job::Cancel {
                    target: reg.target,
                    error: error.clone(),
                })?;
            }
        }
        info!(%path, cancelled = ids.len(), %error, "cancelled listeners");
        Ok(ids.len())
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Apply `mutate` to the tree and queue the resulting child events.
    fn commit<F>(&self, path: &StorePath, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut Value) -> Result<()>,
    {
        let mut tree = self.tree.lock();
        let listeners = self.listeners.read();

        let watched: Vec<(&Registration, Watch)> = listeners
            .values()
            .filter(|reg| reg.path.overlaps(path))
            .map(|reg| {
                let watch = Watch::capture(&tree, &reg.path, path);
                (reg, watch)
            })
            .collect();

        mutate(&mut *tree)?;

        for (reg, watch) in watched {
            for (kind, key, value) in watch.changes(&tree, &reg.path) {
                debug!(
                    listener = ?reg.target.id,
                    path = %reg.path,
                    %kind,
                    %key,
                    "queue child event"
                );
                self.dispatcher.send(Job::Child {
                    target: reg.target.clone(),
                    kind,
                    key,
                    value,
                })?;
            }
        }
        Ok(())
    }

    fn next_push_key(&self) -> String {
        format!("-{:016x}", self.next_push.fetch_add(1, Ordering::SeqCst))
    }
}

impl DocumentStore for MemoryStore {
    fn subscribe(&self, path: &StorePath, listener: Arc<dyn ChildListener>) -> Result<ListenerId> {
        let tree = self.tree.lock();
        let mut listeners = self.listeners.write();

        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::SeqCst));
        let target = Target::new(id, listener);

        // Initial sync: every existing child shows up as added, in key order.
        if let Some(Value::Object(children)) = node_at(&tree, path) {
            for (key, value) in children {
                self.dispatcher.send(Job::Child {
                    target: target.clone(),
                    kind: ChangeKind::Added,
                    key: key.clone(),
                    value: value.clone(),
                })?;
            }
        }

        listeners.insert(
            id,
            Registration {
                path: path.clone(),
                target,
            },
        );
        debug!(listener = ?id, %path, "listener registered");
        Ok(id)
    }

    fn unsubscribe(&self, id: ListenerId) {
        if let Some(reg) = self.listeners.write().remove(&id) {
            reg.target.deactivate();
            debug!(listener = ?id, path = %reg.path, "listener removed");
        }
    }

    fn read(&self, path: &StorePath) -> Result<Option<Value>> {
        Ok(node_at(&self.tree.lock(), path).cloned())
    }

    fn write(&self, path: &StorePath, value: Value) -> Result<()> {
        let value = match normalize(value) {
            Some(value) => value,
            None => return self.delete(path),
        };
        if path.is_empty() && !value.is_object() {
            return Err(HandbookError::InvalidValue {
                path: path.to_string(),
                reason: "the root must be an object".to_string(),
            });
        }
        self.commit(path, |tree| {
            set_at(tree, path, value);
            Ok(())
        })
    }

    fn delete(&self, path: &StorePath) -> Result<()> {
        self.commit(path, |tree| {
            remove_at(tree, path);
            Ok(())
        })
    }

    fn append(&self, path: &StorePath, value: Value) -> Result<String> {
        let key = self.next_push_key();
        self.write(&path.child(&key)?, value)?;
        Ok(key)
    }
}

/// What a listener could see change, captured before a write.
enum Watch {
    /// The write lands below one child of the watched node.
    Child { key: String, before: Option<Value> },
    /// The write replaces the watched node or one of its ancestors.
    Node { before: Option<Value> },
}

impl Watch {
    fn capture(tree: &Value, watched: &StorePath, written: &StorePath) -> Self {
        if written.len() > watched.len() {
            let key = written.segments()[watched.len()].clone();
            let before = child_of(tree, watched, &key).cloned();
            Watch::Child { key, before }
        } else {
            Watch::Node {
                before: node_at(tree, watched).cloned(),
            }
        }
    }

    fn changes(self, tree: &Value, watched: &StorePath) -> Vec<(ChangeKind, String, Value)> {
        match self {
            Watch::Child { key, before } => {
                let after = child_of(tree, watched, &key);
                child_change(before, after)
                    .map(|(kind, value)| vec![(kind, key, value)])
                    .unwrap_or_default()
            }
            Watch::Node { before } => diff_children(before.as_ref(), node_at(tree, watched)),
        }
    }
}

fn child_of<'a>(tree: &'a Value, path: &StorePath, key: &str) -> Option<&'a Value> {
    node_at(tree, path).and_then(|node| node.get(key))
}

fn child_change(before: Option<Value>, after: Option<&Value>) -> Option<(ChangeKind, Value)> {
    match (before, after) {
        (None, Some(after)) => Some((ChangeKind::Added, after.clone())),
        (Some(before), None) => Some((ChangeKind::Removed, before)),
        (Some(before), Some(after)) if &before != after => {
            Some((ChangeKind::Changed, after.clone()))
        }
        _ => None,
    }
}

/// Child-level differences between two versions of a node.
/// Removals come first, then additions and changes, each in key order.
fn diff_children(
    before: Option<&Value>,
    after: Option<&Value>,
) -> Vec<(ChangeKind, String, Value)> {
    let empty = Map::new();
    let before = before.and_then(Value::as_object).unwrap_or(&empty);
    let after = after.and_then(Value::as_object).unwrap_or(&empty);

    let mut changes = Vec::new();
    for (key, old) in before {
        if !after.contains_key(key) {
            changes.push((ChangeKind::Removed, key.clone(), old.clone()));
        }
    }
    for (key, new) in after {
        match before.get(key) {
            None => changes.push((ChangeKind::Added, key.clone(), new.clone())),
            Some(old) if old != new => {
                changes.push((ChangeKind::Changed, key.clone(), new.clone()))
            }
            Some(_) => {}
        }
    }
    changes
}

fn node_at<'a>(tree: &'a Value, path: &StorePath) -> Option<&'a Value> {
    let mut node = tree;
    for segment in path.segments() {
        node = node.as_object()?.get(segment)?;
    }
    Some(node)
}

/// Store `value` at `path`, turning scalar ancestors into objects.
fn set_at(tree: &mut Value, path: &StorePath, value: Value) {
    let mut node = tree;
    for segment in path.segments() {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Some(map) = node.as_object_mut() else {
            return;
        };
        node = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    *node = value;
}

/// Remove the value at `path` and prune ancestors left empty.
fn remove_at(tree: &mut Value, path: &StorePath) {
    fn remove(node: &mut Value, segments: &[String]) {
        let Some((first, rest)) = segments.split_first() else {
            return;
        };
        let Value::Object(map) = node else {
            return;
        };
        if rest.is_empty() {
            map.remove(first);
            return;
        }
        if let Some(child) = map.get_mut(first) {
            remove(child, rest);
            if child.as_object().is_some_and(Map::is_empty) {
                map.remove(first);
            }
        }
    }

    if path.is_empty() {
        *tree = Value::Object(Map::new());
    } else {
        remove(tree, path.segments());
    }
}

/// Drop nulls and empty objects, the way the hosted store never keeps them.
fn normalize(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .filter_map(|(key, value)| normalize(value).map(|value| (key, value)))
                .collect();
            if map.is_empty() {
                None
            } else {
                Some(Value::Object(map))
            }
        }
        other => Some(other),
    }
}
