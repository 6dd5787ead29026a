//! Binding of one store listener to one channel selection.

use crate::channel::{BufferedChannel, Epoch};
use crate::error::ProducerError;
use crate::store::ChildListener;
use crate::types::{
    ChangeEvent, ChangeKind, Entry, ResourceTag, NAME_FIELD, SCOPE_BOOKS, SCOPE_CHAPTERS,
};
use serde_json::Value;
use std::sync::Arc;

/// Forwards the child events of one watched path into a channel.
///
/// A feed is created for every selection and carries the epoch returned by
/// the reset that started it, so anything it delivers after the next reset
/// is discarded by the channel.
pub struct ChannelFeed {
    channel: Arc<BufferedChannel>,
    epoch: Epoch,
}

impl ChannelFeed {
    /// Bind a feed to `channel` for the selection started at `epoch`.
    pub fn new(channel: Arc<BufferedChannel>, epoch: Epoch) -> Self {
        Self { channel, epoch }
    }

    /// The epoch this feed publishes at.
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Turn a store child event into the event shape of the given channel.
    ///
    /// Book and chapter lists report the child's `name`; the chapter channel
    /// reports each field, scoped by the field name.
    pub fn translate(tag: ResourceTag, kind: ChangeKind, key: &str, value: &Value) -> ChangeEvent {
        let (value, scope) = match tag {
            ResourceTag::BookList => (name_of(value), SCOPE_BOOKS),
            ResourceTag::ChapterList => (name_of(value), SCOPE_CHAPTERS),
            ResourceTag::Chapter => (render(value), key),
        };
        ChangeEvent::new(Entry::new(key, value), scope, kind)
    }
}

impl ChildListener for ChannelFeed {
    fn on_child(&self, kind: ChangeKind, key: &str, value: &Value) {
        let event = Self::translate(self.channel.tag(), kind, key, value);
        self.channel.publish_at(self.epoch, event);
    }

    fn on_cancelled(&self, error: ProducerError) {
        self.channel.publish_error_at(self.epoch, error);
    }
}

fn name_of(value: &Value) -> String {
    value
        .get(NAME_FIELD)
        .map(render)
        .unwrap_or_default()
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
