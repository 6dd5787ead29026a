//! Subscription manager binding the three channels to store streams.

use crate::channel::{BufferedChannel, ChangeReceiver, ChannelConfig, ChannelStats};
use crate::error::Result;
use crate::store::{DocumentStore, ListenerId};
use crate::types::{ChangeEvent, Layout, ResourceTag, StorePath};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::feed::ChannelFeed;

/// A channel plus the store listener currently feeding it.
///
/// The feed lock serializes selections on this level; it is never the
/// channel lock, so store calls made under it cannot block producers.
struct Binding {
    channel: Arc<BufferedChannel>,
    feed: Mutex<Option<ListenerId>>,
}

impl Binding {
    fn new(channel: Arc<BufferedChannel>) -> Self {
        Self {
            channel,
            feed: Mutex::new(None),
        }
    }
}

/// Owns the book-list, chapter-list and chapter channels and keeps each one
/// fed from the store path of the caller's current selection.
///
/// Selecting a level resets its channel and every level below it.
pub struct SubscriptionManager {
    store: Arc<dyn DocumentStore>,
    layout: Layout,
    book_list: Binding,
    chapter_list: Binding,
    chapter: Binding,
}

impl SubscriptionManager {
    /// Create a manager with the default `books` layout.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_layout(store, Layout::default(), ChannelConfig::default())
    }

    /// Create a manager over `layout`, with `config` applied to all three channels.
    pub fn with_layout(
        store: Arc<dyn DocumentStore>,
        layout: Layout,
        config: ChannelConfig,
    ) -> Self {
        let chapter = Arc::new(BufferedChannel::new(ResourceTag::Chapter, config.clone()));
        let chapter_list = Arc::new(BufferedChannel::with_children(
            ResourceTag::ChapterList,
            config.clone(),
            vec![Arc::clone(&chapter)],
        ));
        let book_list = Arc::new(BufferedChannel::with_children(
            ResourceTag::BookList,
            config,
            vec![Arc::clone(&chapter_list)],
        ));

        Self {
            store,
            layout,
            book_list: Binding::new(book_list),
            chapter_list: Binding::new(chapter_list),
            chapter: Binding::new(chapter),
        }
    }

    /// Store paths the selections resolve against.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// The channel with the given identity.
    pub fn channel(&self, tag: ResourceTag) -> &Arc<BufferedChannel> {
        &self.binding(tag).channel
    }

    // --- Selection ---

    /// Watch the book list. Resets the chapter list and chapter as well.
    pub fn select_book_list(&self, receiver: Arc<dyn ChangeReceiver>) -> Result<()> {
        info!("select book list");
        let path = self.layout.books();
        self.select(&self.book_list, &[&self.chapter_list, &self.chapter], path, receiver)
    }

    /// Watch the chapters of `book_id`. Resets the chapter as well.
    pub fn select_book_chapters(
        &self,
        book_id: &str,
        receiver: Arc<dyn ChangeReceiver>,
    ) -> Result<()> {
        let path = self.layout.chapters(book_id)?;
        info!(book = book_id, "select book chapters");
        self.select(&self.chapter_list, &[&self.chapter], path, receiver)
    }

    /// Watch the fields of one chapter.
    pub fn select_chapter(
        &self,
        book_id: &str,
        chapter_id: &str,
        receiver: Arc<dyn ChangeReceiver>,
    ) -> Result<()> {
        let path = self.layout.chapter(book_id, chapter_id)?;
        info!(book = book_id, chapter = chapter_id, "select chapter");
        self.select(&self.chapter, &[], path, receiver)
    }

    /// Reset, detach the previous feeds, arm, attach the new feed.
    ///
    /// If the store refuses the new feed the level is left reset, unfed and
    /// unarmed.
    fn select(
        &self,
        binding: &Binding,
        below: &[&Binding],
        path: StorePath,
        receiver: Arc<dyn ChangeReceiver>,
    ) -> Result<()> {
        let mut feed = binding.feed.lock();

        let epoch = binding.channel.reset();
        for child in below {
            self.detach(child);
        }
        if let Some(old) = feed.take() {
            self.store.unsubscribe(old);
        }

        binding.channel.arm(receiver);

        let listener = Arc::new(ChannelFeed::new(Arc::clone(&binding.channel), epoch));
        let id = match self.store.subscribe(&path, listener) {
            Ok(id) => id,
            Err(e) => {
                binding.channel.disarm();
                warn!(channel = %binding.channel.tag(), %path, error = %e, "feed not attached");
                return Err(e);
            }
        };
        debug!(
            channel = %binding.channel.tag(),
            %path,
            epoch = epoch.0,
            listener = ?id,
            "feed attached"
        );
        *feed = Some(id);
        Ok(())
    }

    fn detach(&self, binding: &Binding) {
        if let Some(id) = binding.feed.lock().take() {
            debug!(channel = %binding.channel.tag(), listener = ?id, "feed detached");
            self.store.unsubscribe(id);
        }
    }

    // --- Polling ---

    /// Book-list events buffered since the previous poll.
    pub fn poll_book_list(&self) -> Vec<ChangeEvent> {
        self.book_list.channel.drain()
    }

    /// Chapter-list events buffered since the previous poll.
    pub fn poll_book_chapters(&self) -> Vec<ChangeEvent> {
        self.chapter_list.channel.drain()
    }

    /// Chapter field events buffered since the previous poll.
    pub fn poll_chapter(&self) -> Vec<ChangeEvent> {
        self.chapter.channel.drain()
    }

    // --- Lifecycle ---

    /// Stats for the book-list, chapter-list and chapter channels, in that order.
    pub fn stats(&self) -> Vec<ChannelStats> {
        [&self.book_list, &self.chapter_list, &self.chapter]
            .iter()
            .map(|binding| binding.channel.stats())
            .collect()
    }

    /// Detach every feed. Channels keep their buffered events.
    pub fn close(&self) {
        for binding in [&self.chapter, &self.chapter_list, &self.book_list] {
            self.detach(binding);
        }
    }

    fn binding(&self, tag: ResourceTag) -> &Binding {
        match tag {
            ResourceTag::BookList => &self.book_list,
            ResourceTag::ChapterList => &self.chapter_list,
            ResourceTag::Chapter => &self.chapter,
        }
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        self.close();
    }
}
