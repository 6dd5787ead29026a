//! Main Handbook struct tying the store and the subscriptions together.

use crate::channel::{ChannelConfig, LiveHandle};
use crate::error::{HandbookError, Result};
use crate::store::{DocumentStore, MemoryStore, MemoryStoreConfig};
use crate::subscriptions::SubscriptionManager;
use crate::types::{ChangeEvent, Layout, CONTENT_FIELD, NAME_FIELD, SCOPE_BOOKS};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Handbook configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandbookConfig {
    /// Store path holding the books.
    /// Default: "books"
    pub root: String,

    /// Settings shared by the three channels.
    pub channel: ChannelConfig,

    /// Settings for an in-memory store, when one is used.
    pub store: MemoryStoreConfig,
}

impl Default for HandbookConfig {
    fn default() -> Self {
        Self {
            root: SCOPE_BOOKS.to_string(),
            channel: ChannelConfig::default(),
            store: MemoryStoreConfig::default(),
        }
    }
}

impl HandbookConfig {
    /// Path layout below the configured root.
    pub fn layout(&self) -> Result<Layout> {
        Layout::new(&self.root)
    }
}

impl FromStr for HandbookConfig {
    type Err = HandbookError;

    /// Parse a JSON document. Missing fields take their defaults.
    fn from_str(s: &str) -> Result<Self> {
        let config: HandbookConfig = serde_json::from_str(s)?;
        config.layout()?;
        Ok(config)
    }
}

/// The operations offered to RPC callers.
///
/// `get_*` calls start watching a resource and return the handle on which
/// the first change arrives; later changes are collected with the matching
/// `poll_*` call. Write commands go straight to the store and show up on
/// the channels like any other change.
pub struct Handbook {
    store: Arc<dyn DocumentStore>,
    layout: Layout,
    subscriptions: SubscriptionManager,
}

impl Handbook {
    /// Open a handbook over `store` with the layout and channel settings in `config`.
    pub fn open(store: Arc<dyn DocumentStore>, config: HandbookConfig) -> Result<Self> {
        let layout = config.layout()?;
        let subscriptions =
            SubscriptionManager::with_layout(Arc::clone(&store), layout.clone(), config.channel);
        info!(root = %layout.books(), "handbook opened");

        Ok(Self {
            store,
            layout,
            subscriptions,
        })
    }

    /// Open over a fresh [`MemoryStore`] built from `config.store`.
    pub fn in_memory(config: HandbookConfig) -> Result<(Self, Arc<MemoryStore>)> {
        let store = Arc::new(MemoryStore::with_config(config.store.clone())?);
        let handbook = Self::open(store.clone(), config)?;
        Ok((handbook, store))
    }

    /// The subscription manager behind the `get_*` and `poll_*` calls.
    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    // --- Watching ---

    /// Start watching the book list. Resets the chapter list and chapter.
    pub fn get_book_list(&self) -> Result<LiveHandle> {
        info!("called get_book_list()");
        let (sender, handle) = LiveHandle::pair();
        self.subscriptions.select_book_list(Arc::new(sender))?;
        Ok(handle)
    }

    /// Start watching the chapters of `book_id`. Resets the chapter.
    pub fn get_book_chapters(&self, book_id: &str) -> Result<LiveHandle> {
        info!(book = book_id, "called get_book_chapters()");
        let (sender, handle) = LiveHandle::pair();
        self.subscriptions
            .select_book_chapters(book_id, Arc::new(sender))?;
        Ok(handle)
    }

    /// Start watching the fields of one chapter.
    pub fn get_chapter(&self, book_id: &str, chapter_id: &str) -> Result<LiveHandle> {
        info!(book = book_id, chapter = chapter_id, "called get_chapter()");
        let (sender, handle) = LiveHandle::pair();
        self.subscriptions
            .select_chapter(book_id, chapter_id, Arc::new(sender))?;
        Ok(handle)
    }

    /// Book-list changes buffered since the previous poll.
    pub fn poll_book_list(&self) -> Vec<ChangeEvent> {
        self.subscriptions.poll_book_list()
    }

    /// Chapter-list changes buffered since the previous poll.
    pub fn poll_book_chapters(&self) -> Vec<ChangeEvent> {
        self.subscriptions.poll_book_chapters()
    }

    /// Chapter field changes buffered since the previous poll.
    pub fn poll_chapter(&self) -> Vec<ChangeEvent> {
        self.subscriptions.poll_chapter()
    }

    // --- Writes ---

    /// Set the name of a book, creating it if it does not exist.
    pub fn rename_book(&self, book_id: &str, name: &str) -> Result<()> {
        info!(book = book_id, name, "rename book");
        let path = self.layout.book(book_id)?.child(NAME_FIELD)?;
        self.store.write(&path, Value::from(name))
    }

    /// Set the name of a chapter, creating it if it does not exist.
    pub fn rename_chapter(&self, book_id: &str, chapter_id: &str, name: &str) -> Result<()> {
        info!(book = book_id, chapter = chapter_id, name, "rename chapter");
        let path = self.layout.chapter(book_id, chapter_id)?.child(NAME_FIELD)?;
        self.store.write(&path, Value::from(name))
    }

    /// Replace the content of a chapter.
    pub fn update_chapter(&self, book_id: &str, chapter_id: &str, content: &str) -> Result<()> {
        info!(book = book_id, chapter = chapter_id, len = content.len(), "update chapter");
        let path = self.layout.chapter(book_id, chapter_id)?.child(CONTENT_FIELD)?;
        self.store.write(&path, Value::from(content))
    }

    /// Add a book and return its generated id.
    pub fn add_book(&self, name: &str) -> Result<String> {
        let id = self.store.append(&self.layout.books(), json!({ NAME_FIELD: name }))?;
        info!(book = %id, name, "added book");
        Ok(id)
    }

    /// Add a chapter to `book_id` and return its generated id.
    pub fn add_chapter(&self, book_id: &str, name: &str) -> Result<String> {
        let id = self
            .store
            .append(&self.layout.chapters(book_id)?, json!({ NAME_FIELD: name }))?;
        info!(book = book_id, chapter = %id, name, "added chapter");
        Ok(id)
    }

    /// Delete a book and all of its chapters. Missing books are ignored.
    pub fn remove_book(&self, book_id: &str) -> Result<()> {
        info!(book = book_id, "remove book");
        self.store.delete(&self.layout.book(book_id)?)
    }

    /// Delete a chapter. Missing chapters are ignored.
    pub fn remove_chapter(&self, book_id: &str, chapter_id: &str) -> Result<()> {
        info!(book = book_id, chapter = chapter_id, "remove chapter");
        self.store.delete(&self.layout.chapter(book_id, chapter_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChangeKind, ResourceTag, StorePath};
    use std::time::Duration;

    fn open() -> (Arc<MemoryStore>, Handbook) {
        let store = Arc::new(MemoryStore::new().unwrap());
        let handbook = Handbook::open(store.clone(), HandbookConfig::default()).unwrap();
        (store, handbook)
    }

    #[test]
    fn test_config_from_str() {
        let config: HandbookConfig = r#"{"root": "library", "channel": {"retain_drained": 10}}"#
            .parse()
            .unwrap();
        assert_eq!(config.root, "library");
        assert_eq!(config.channel.retain_drained, Some(10));
        assert_eq!(config.store, MemoryStoreConfig::default());

        let config: HandbookConfig = "{}".parse().unwrap();
        assert_eq!(config, HandbookConfig::default());

        assert!(matches!(
            r#"{"root": "a//b"}"#.parse::<HandbookConfig>(),
            Err(HandbookError::InvalidPath(_))
        ));
        assert!(matches!(
            "{".parse::<HandbookConfig>(),
            Err(HandbookError::Serialization(_))
        ));
    }

    #[test]
    fn test_add_book_shows_up_live() {
        let (store, handbook) = open();
        let handle = handbook.get_book_list().unwrap();

        let id = handbook.add_book("Moby Dick").unwrap();
        store.flush().unwrap();

        let live = handle.recv_timeout(Duration::from_secs(1)).unwrap().unwrap();
        assert_eq!(live.entry.key, id);
        assert_eq!(live.entry.value, "Moby Dick");
        assert_eq!(live.kind, ChangeKind::Added);
    }

    #[test]
    fn test_writes_land_at_layout_paths() {
        let (store, handbook) = open();
        let book = handbook.add_book("Dune").unwrap();
        let chapter = handbook.add_chapter(&book, "Arrakis").unwrap();
        handbook.update_chapter(&book, &chapter, "A beginning").unwrap();
        handbook.rename_chapter(&book, &chapter, "Dune").unwrap();

        let path = StorePath::parse(&format!("books/{}/chapters/{}", book, chapter)).unwrap();
        assert_eq!(
            store.read(&path).unwrap(),
            Some(json!({"name": "Dune", "content": "A beginning"}))
        );

        handbook.remove_chapter(&book, &chapter).unwrap();
        assert_eq!(store.read(&path).unwrap(), None);
        handbook.remove_book(&book).unwrap();
        assert_eq!(store.read(&StorePath::parse("books").unwrap()).unwrap(), None);
    }

    #[test]
    fn test_rename_buffers_after_live() {
        let (store, handbook) = open();
        let book = handbook.add_book("Emma").unwrap();
        let handle = handbook.get_book_list().unwrap();
        handbook.rename_book(&book, "Persuasion").unwrap();
        store.flush().unwrap();

        assert_eq!(handle.try_recv().unwrap().unwrap().entry.value, "Emma");
        let batch = handbook.poll_book_list();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].kind, ChangeKind::Changed);
        assert_eq!(batch[0].entry.value, "Persuasion");
        assert_eq!(batch[0].tag, Some(ResourceTag::BookList));
    }

    #[test]
    fn test_in_memory_uses_configured_root() {
        let config: HandbookConfig = r#"{"root": "library/shelf"}"#.parse().unwrap();
        let (handbook, store) = Handbook::in_memory(config).unwrap();
        let id = handbook.add_book("Ulysses").unwrap();

        let path = StorePath::parse(&format!("library/shelf/{}/name", id)).unwrap();
        assert_eq!(store.read(&path).unwrap(), Some(json!("Ulysses")));
    }

    #[test]
    fn test_rejects_bad_ids() {
        let (_store, handbook) = open();
        assert!(matches!(
            handbook.rename_book("a.b", "x"),
            Err(HandbookError::InvalidKey { .. })
        ));
        assert!(handbook.get_chapter("b1", "").is_err());
        assert!(handbook.remove_chapter("#", "c1").is_err());
    }
}
