//! Property tests for the buffered channel protocol.

use handbook::{
    BufferedChannel, ChangeEvent, ChangeKind, ChannelConfig, LiveHandle, Publish, ResourceTag,
};
use proptest::prelude::*;
use std::sync::Arc;

#[derive(Clone, Debug)]
enum Op {
    Publish(u8),
    Drain,
    Reset,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => any::<u8>().prop_map(Op::Publish),
        3 => Just(Op::Drain),
        1 => Just(Op::Reset),
    ]
}

fn kind(n: u8) -> ChangeKind {
    match n % 3 {
        0 => ChangeKind::Added,
        1 => ChangeKind::Changed,
        _ => ChangeKind::Removed,
    }
}

proptest! {
    /// Within one selection every publish is seen exactly once: the first
    /// live, the rest through drains, in publish order.
    #[test]
    fn prop_each_event_seen_once_in_order(
        ops in prop::collection::vec(op(), 1..200),
        retain in prop::option::of(0usize..8),
    ) {
        let channel = BufferedChannel::new(
            ResourceTag::ChapterList,
            ChannelConfig { retain_drained: retain },
        );

        let mut published: Vec<ChangeEvent> = Vec::new();
        let mut seen: Vec<ChangeEvent> = Vec::new();
        let (sender, mut live) = LiveHandle::pair();
        channel.reset();
        channel.arm(Arc::new(sender));

        let check = |published: &[ChangeEvent], seen: &[ChangeEvent]| {
            let expected: Vec<ChangeEvent> = published.to_vec();
            prop_assert_eq!(seen.len(), expected.len());
            for (got, want) in seen.iter().zip(expected.iter()) {
                prop_assert_eq!(&got.entry, &want.entry);
                prop_assert_eq!(got.kind, want.kind);
            }
            Ok(())
        };

        for (i, op) in ops.into_iter().enumerate() {
            match op {
                Op::Publish(n) => {
                    let event =
                        ChangeEvent::of(kind(n), format!("k{}", i), n.to_string(), "chapters");
                    let outcome = channel.publish(event.clone());
                    if published.is_empty() {
                        prop_assert_eq!(outcome, Publish::Live);
                        let delivered = live.try_recv().unwrap().unwrap();
                        prop_assert_eq!(delivered.tag, None);
                        seen.push(delivered);
                    } else {
                        prop_assert_eq!(outcome, Publish::Buffered);
                    }
                    published.push(event);
                }
                Op::Drain => {
                    let batch = channel.drain();
                    prop_assert!(batch.iter().all(|e| e.tag == Some(ResourceTag::ChapterList)));
                    seen.extend(batch);
                    check(&published, &seen)?;
                    prop_assert!(channel.drain().is_empty());
                }
                Op::Reset => {
                    seen.extend(channel.drain());
                    check(&published, &seen)?;

                    channel.reset();
                    prop_assert!(channel.drain().is_empty());
                    prop_assert_eq!(channel.stats().buffered, 0);

                    let (sender, handle) = LiveHandle::pair();
                    channel.arm(Arc::new(sender));
                    live = handle;
                    published.clear();
                    seen.clear();
                }
            }

            let stats = channel.stats();
            prop_assert!(stats.pending <= stats.buffered);
            prop_assert_eq!(stats.delivered, !published.is_empty());
            if let Some(limit) = retain {
                prop_assert!(stats.buffered - stats.pending <= limit);
            }
        }

        seen.extend(channel.drain());
        check(&published, &seen)?;
    }
}
