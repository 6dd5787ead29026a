//! Core types for the handbook change pipeline.

use crate::error::{HandbookError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Scope of events on the book-list channel.
pub const SCOPE_BOOKS: &str = "books";

/// Scope of events on the chapter-list channel.
pub const SCOPE_CHAPTERS: &str = "chapters";

/// Field holding the display name of a book or chapter.
pub const NAME_FIELD: &str = "name";

/// Field holding the text of a chapter.
pub const CONTENT_FIELD: &str = "content";

/// Segment under a book that holds its chapters.
pub const CHAPTERS_SEGMENT: &str = "chapters";

/// Characters the document store does not accept inside a key.
const FORBIDDEN_KEY_CHARS: &[char] = &['/', '.', '#', '$', '[', ']'];

/// A resource identifier paired with its current display value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entry {
    pub key: String,
    pub value: String,
}

impl Entry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Kind of child change reported by the document store.
///
/// Moves are not modeled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Changed,
    Removed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Added => f.write_str("added"),
            ChangeKind::Changed => f.write_str("changed"),
            ChangeKind::Removed => f.write_str("removed"),
        }
    }
}

/// Identity of one of the three buffered channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceTag {
    BookList,
    ChapterList,
    Chapter,
}

impl fmt::Display for ResourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceTag::BookList => f.write_str("book_list"),
            ResourceTag::ChapterList => f.write_str("chapter_list"),
            ResourceTag::Chapter => f.write_str("chapter"),
        }
    }
}

/// One change pushed by the document store.
///
/// `tag` is only set once the event has been placed in a channel's buffer;
/// events handed to a live receiver carry no tag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub entry: Entry,
    /// Logical list the event belongs to: `books`, `chapters`, or a chapter field name.
    pub scope: String,
    pub kind: ChangeKind,
    pub tag: Option<ResourceTag>,
}

impl ChangeEvent {
    /// Create an untagged event.
    pub fn new(entry: Entry, scope: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            entry,
            scope: scope.into(),
            kind,
            tag: None,
        }
    }

    /// Shorthand for an event built from a key/value pair.
    pub fn of(
        kind: ChangeKind,
        key: impl Into<String>,
        value: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self::new(Entry::new(key, value), scope, kind)
    }

    pub fn with_tag(mut self, tag: ResourceTag) -> Self {
        self.tag = Some(tag);
        self
    }
}

/// Check that `key` can be used as a single path segment.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(HandbookError::InvalidKey {
            key: key.to_string(),
            reason: "key is empty",
        });
    }
    if key.contains(FORBIDDEN_KEY_CHARS) {
        return Err(HandbookError::InvalidKey {
            key: key.to_string(),
            reason: "key contains one of / . # $ [ ]",
        });
    }
    if key.chars().any(char::is_control) {
        return Err(HandbookError::InvalidKey {
            key: key.to_string(),
            reason: "key contains control characters",
        });
    }
    Ok(())
}

/// Hierarchical location in the document store, e.g. `books/b1/chapters/c1`.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct StorePath(Vec<String>);

impl StorePath {
    /// The empty path, addressing the whole tree.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse a `/`-separated path. Leading and trailing slashes are ignored.
    pub fn parse(path: &str) -> Result<Self> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        let mut segments = Vec::new();
        for segment in trimmed.split('/') {
            validate_key(segment)
                .map_err(|e| HandbookError::InvalidPath(format!("{}: {}", path, e)))?;
            segments.push(segment.to_string());
        }
        Ok(Self(segments))
    }

    /// Extend the path by one validated segment.
    pub fn child(&self, segment: &str) -> Result<Self> {
        validate_key(segment)?;
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        Ok(Self(segments))
    }

    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Last segment, if any.
    pub fn key(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if `self` equals `other` or lies above it.
    pub fn is_prefix_of(&self, other: &StorePath) -> bool {
        other.0.len() >= self.0.len() && other.0[..self.0.len()] == self.0[..]
    }

    /// True if one of the two paths contains the other.
    pub fn overlaps(&self, other: &StorePath) -> bool {
        self.is_prefix_of(other) || other.is_prefix_of(self)
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

impl fmt::Debug for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorePath({})", self)
    }
}

/// Paths of the book/chapter layout below a configurable root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layout {
    root: StorePath,
}

impl Layout {
    pub fn new(root: &str) -> Result<Self> {
        let root = StorePath::parse(root)?;
        if root.is_empty() {
            return Err(HandbookError::InvalidPath(
                "layout root must not be empty".to_string(),
            ));
        }
        Ok(Self { root })
    }

    /// `{root}`
    pub fn books(&self) -> StorePath {
        self.root.clone()
    }

    /// `{root}/{book}`
    pub fn book(&self, book_id: &str) -> Result<StorePath> {
        self.root.child(book_id)
    }

    /// `{root}/{book}/chapters`
    pub fn chapters(&self, book_id: &str) -> Result<StorePath> {
        self.book(book_id)?.child(CHAPTERS_SEGMENT)
    }

    /// `{root}/{book}/chapters/{chapter}`
    pub fn chapter(&self, book_id: &str, chapter_id: &str) -> Result<StorePath> {
        self.chapters(book_id)?.child(chapter_id)
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            root: StorePath(vec![SCOPE_BOOKS.to_string()]),
        }
    }
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time. A clock before the epoch reads as zero.
    pub fn now() -> Self {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or(0);
        Timestamp(micros)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}
