//! Integration tests for the handbook change pipeline.

use handbook::{
    ChangeEvent, ChangeKind, DocumentStore, Entry, Handbook, HandbookConfig, MemoryStore,
    ResourceTag, StorePath,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn open() -> (Arc<MemoryStore>, Handbook) {
    init_tracing();
    let store = Arc::new(MemoryStore::new().unwrap());
    let handbook = Handbook::open(store.clone(), HandbookConfig::default()).unwrap();
    (store, handbook)
}

fn seed(store: &MemoryStore) {
    store
        .write(
            &StorePath::parse("books").unwrap(),
            json!({
                "b1": {
                    "name": "Moby Dick",
                    "chapters": {
                        "c1": {"name": "Loomings", "content": "Call me Ishmael."},
                        "c2": {"name": "The Carpet-Bag", "content": "I stuffed a shirt or two."}
                    }
                },
                "b2": {
                    "name": "Dune",
                    "chapters": {
                        "c1": {"name": "Arrakis", "content": "In the week before their departure"}
                    }
                }
            }),
        )
        .unwrap();
}

// --- Realistic Workflow Tests ---

#[test]
fn test_reader_navigation_workflow() {
    let (store, handbook) = open();
    seed(&store);

    // Open the library
    let books = handbook.get_book_list().unwrap();
    store.flush().unwrap();
    let first = books.recv_timeout(Duration::from_secs(1)).unwrap().unwrap();
    assert_eq!(first, ChangeEvent::of(ChangeKind::Added, "b1", "Moby Dick", "books"));
    let rest = handbook.poll_book_list();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].entry.value, "Dune");
    assert_eq!(rest[0].tag, Some(ResourceTag::BookList));

    // Open a book
    let chapters = handbook.get_book_chapters("b1").unwrap();
    store.flush().unwrap();
    let first = chapters.recv_timeout(Duration::from_secs(1)).unwrap().unwrap();
    assert_eq!(first.entry, Entry::new("c1", "Loomings"));
    assert_eq!(first.scope, "chapters");
    let rest = handbook.poll_book_chapters();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].entry.value, "The Carpet-Bag");

    // Open a chapter: one event per field
    let chapter = handbook.get_chapter("b1", "c1").unwrap();
    store.flush().unwrap();
    let first = chapter.recv_timeout(Duration::from_secs(1)).unwrap().unwrap();
    assert_eq!(first.scope, "content");
    assert_eq!(first.entry.value, "Call me Ishmael.");
    let rest = handbook.poll_chapter();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].scope, "name");
    assert_eq!(rest[0].tag, Some(ResourceTag::Chapter));

    // Book list channel is unaffected by the deeper selections
    assert!(handbook.poll_book_list().is_empty());
    assert!(handbook.subscriptions().channel(ResourceTag::BookList).is_delivered());
}

#[test]
fn test_edits_reach_every_watching_level() {
    let (store, handbook) = open();
    seed(&store);

    let _books = handbook.get_book_list().unwrap();
    let _chapters = handbook.get_book_chapters("b1").unwrap();
    let _chapter = handbook.get_chapter("b1", "c2").unwrap();
    store.flush().unwrap();
    handbook.poll_book_list();
    handbook.poll_book_chapters();
    handbook.poll_chapter();

    handbook.rename_chapter("b1", "c2", "Carpet Bag").unwrap();
    store.flush().unwrap();

    // The book itself changed below its name
    let books = handbook.poll_book_list();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0].kind, ChangeKind::Changed);
    assert_eq!(books[0].entry.key, "b1");

    let chapters = handbook.poll_book_chapters();
    assert_eq!(chapters.len(), 1);
    assert_eq!(chapters[0].entry, Entry::new("c2", "Carpet Bag"));

    let chapter = handbook.poll_chapter();
    assert_eq!(chapter.len(), 1);
    assert_eq!(chapter[0].scope, "name");
    assert_eq!(chapter[0].entry.value, "Carpet Bag");
}

#[test]
fn test_switching_books_drops_old_chapters() {
    let (store, handbook) = open();
    seed(&store);

    let _b1 = handbook.get_book_chapters("b1").unwrap();
    store.flush().unwrap();

    let b2 = handbook.get_book_chapters("b2").unwrap();
    handbook.add_chapter("b1", "Chapel").unwrap();
    let added = handbook.add_chapter("b2", "Fremen").unwrap();
    store.flush().unwrap();

    let first = b2.recv_timeout(Duration::from_secs(1)).unwrap().unwrap();
    assert_eq!(first.entry.value, "Arrakis");

    let rest = handbook.poll_book_chapters();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].entry.key, added);
    assert_eq!(rest[0].entry.value, "Fremen");
}

#[test]
fn test_removal_carries_last_value() {
    let (store, handbook) = open();
    seed(&store);

    let _books = handbook.get_book_list().unwrap();
    store.flush().unwrap();
    handbook.poll_book_list();

    handbook.remove_book("b2").unwrap();
    store.flush().unwrap();

    let batch = handbook.poll_book_list();
    assert_eq!(
        batch,
        vec![ChangeEvent::of(ChangeKind::Removed, "b2", "Dune", "books")
            .with_tag(ResourceTag::BookList)]
    );
}

#[test]
fn test_updates_to_chapter_content() {
    let (store, handbook) = open();
    let book = handbook.add_book("Notes").unwrap();
    let chapter = handbook.add_chapter(&book, "Day one").unwrap();

    let live = handbook.get_chapter(&book, &chapter).unwrap();
    store.flush().unwrap();
    let first = live.recv_timeout(Duration::from_secs(1)).unwrap().unwrap();
    assert_eq!(first.scope, "name");

    for draft in ["draft 1", "draft 2", "final"] {
        handbook.update_chapter(&book, &chapter, draft).unwrap();
    }
    store.flush().unwrap();

    let batch = handbook.poll_chapter();
    let seen: Vec<_> = batch.iter().map(|e| (e.kind, e.entry.value.as_str())).collect();
    assert_eq!(
        seen,
        vec![
            (ChangeKind::Added, "draft 1"),
            (ChangeKind::Changed, "draft 2"),
            (ChangeKind::Changed, "final"),
        ]
    );
    assert!(batch.iter().all(|e| e.scope == "content"));
}

#[test]
fn test_poll_without_selection_is_empty() {
    let (store, handbook) = open();
    seed(&store);

    assert!(handbook.poll_book_list().is_empty());
    assert!(handbook.poll_book_chapters().is_empty());
    assert!(handbook.poll_chapter().is_empty());
}

#[test]
fn test_drained_events_remain_inspectable() {
    let (store, handbook) = open();
    seed(&store);
    let _books = handbook.get_book_list().unwrap();
    store.flush().unwrap();

    assert_eq!(handbook.poll_book_list().len(), 1);
    let channel = handbook.subscriptions().channel(ResourceTag::BookList);
    assert_eq!(channel.buffered().len(), 1);
    assert_eq!(channel.stats().pending, 0);

    // Reselecting starts over from the initial sync
    let _books = handbook.get_book_list().unwrap();
    store.flush().unwrap();
    assert_eq!(channel.buffered().len(), 1);
    assert_eq!(channel.stats().pending, 1);
    assert!(store.read(&StorePath::parse("books/b1").unwrap()).unwrap().is_some());
}
