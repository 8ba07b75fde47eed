use crossbeam_channel::{unbounded, Receiver, Sender};
use indexmap::IndexMap;
use strum::Display;

use crate::error::StoreError;
use crate::model::{Comment, Letter, RecordId};
use crate::storage::{RecordStore, StoreEvent, SubscriptionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum StreamKind {
    Letters,
    Comments,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamKey {
    Letters,
    Comments(RecordId),
}

impl StreamKey {
    pub fn kind(&self) -> StreamKind {
        match self {
            StreamKey::Letters => StreamKind::Letters,
            StreamKey::Comments(_) => StreamKind::Comments,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHandle {
    key: StreamKey,
    subscription: SubscriptionId,
}

impl StreamHandle {
    pub fn key(&self) -> &StreamKey {
        &self.key
    }

    pub fn subscription(&self) -> SubscriptionId {
        self.subscription
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUpdate {
    Letters(Vec<Letter>),
    Comments {
        letter_id: RecordId,
        comments: Vec<Comment>,
    },
    Failed { key: StreamKey, error: StoreError },
}

#[derive(Debug)]
pub struct SubscriptionManager {
    sender: Sender<StoreEvent>,
    receiver: Receiver<StoreEvent>,
    active: IndexMap<StreamKind, StreamHandle>,
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionManager {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            active: IndexMap::new(),
        }
    }

    /// Opens `key`, first tearing down whatever stream of the same kind is
    /// live. The old stream is gone even when the new subscribe fails.
    pub fn subscribe<S>(&mut self, store: &S, key: StreamKey) -> Result<StreamHandle, StoreError>
    where
        S: RecordStore + ?Sized,
    {
        self.detach(store, key.kind());
        let subscription = match &key {
            StreamKey::Letters => store.subscribe_letters(self.sender.clone())?,
            StreamKey::Comments(letter_id) => {
                store.subscribe_comments(letter_id, self.sender.clone())?
            }
        };
        tracing::debug!(stream = %key.kind(), subscription = subscription.get(), "stream attached");
        let handle = StreamHandle { key, subscription };
        self.active.insert(handle.key.kind(), handle.clone());
        Ok(handle)
    }

    pub fn unsubscribe<S>(&mut self, store: &S, handle: &StreamHandle) -> bool
    where
        S: RecordStore + ?Sized,
    {
        let kind = handle.key.kind();
        if self.active.get(&kind) != Some(handle) {
            return false;
        }
        self.active.shift_remove(&kind);
        store.unsubscribe(handle.subscription);
        tracing::debug!(stream = %kind, subscription = handle.subscription.get(), "stream detached");
        true
    }

    pub fn detach<S>(&mut self, store: &S, kind: StreamKind) -> Option<StreamHandle>
    where
        S: RecordStore + ?Sized,
    {
        let handle = self.active.shift_remove(&kind)?;
        store.unsubscribe(handle.subscription);
        tracing::debug!(stream = %kind, subscription = handle.subscription.get(), "stream detached");
        Some(handle)
    }

    pub fn active(&self, kind: StreamKind) -> Option<&StreamHandle> {
        self.active.get(&kind)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn drain(&mut self) -> Vec<StreamUpdate> {
        let events: Vec<StoreEvent> = self.receiver.try_iter().collect();
        let mut updates = Vec::with_capacity(events.len());
        for event in events {
            let subscription = event.subscription();
            let Some(kind) = self.kind_of(subscription) else {
                tracing::trace!(subscription = subscription.get(), "dropping event from closed stream");
                continue;
            };
            match event {
                StoreEvent::Letters { letters, .. } => updates.push(StreamUpdate::Letters(letters)),
                StoreEvent::Comments {
                    letter_id,
                    comments,
                    ..
                } => updates.push(StreamUpdate::Comments {
                    letter_id,
                    comments,
                }),
                StoreEvent::Failed { error, .. } => {
                    if let Some(handle) = self.active.shift_remove(&kind) {
                        tracing::warn!(stream = %kind, %error, "stream failed");
                        updates.push(StreamUpdate::Failed {
                            key: handle.key,
                            error,
                        });
                    }
                }
            }
        }
        updates
    }

    fn kind_of(&self, subscription: SubscriptionId) -> Option<StreamKind> {
        self.active
            .iter()
            .find(|(_, handle)| handle.subscription == subscription)
            .map(|(kind, _)| *kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LetterKind, NewComment, NewLetter};
    use crate::storage::MemoryStore;
    use assert_matches::assert_matches;

    fn seeded() -> (MemoryStore, RecordId, RecordId) {
        let store = MemoryStore::new();
        let mut ids = Vec::new();
        for title in ["a", "b"] {
            ids.push(
                store
                    .create_letter(NewLetter {
                        kind: LetterKind::Letter,
                        title: title.into(),
                        date: String::new(),
                        body: "body".into(),
                    })
                    .unwrap(),
            );
        }
        let b = ids.pop().unwrap();
        let a = ids.pop().unwrap();
        (store, a, b)
    }

    fn comment(store: &MemoryStore, letter_id: &RecordId, text: &str) {
        store
            .create_comment(NewComment {
                letter_id: letter_id.clone(),
                author: "x".into(),
                text: text.into(),
            })
            .unwrap();
    }

    #[test]
    fn switching_comment_streams_tears_down_the_previous_one() {
        let (store, a, b) = seeded();
        let mut streams = SubscriptionManager::new();
        streams.subscribe(&store, StreamKey::Comments(a.clone())).unwrap();
        streams.subscribe(&store, StreamKey::Comments(b.clone())).unwrap();
        assert_eq!(store.live_subscriptions(), 1);
        assert_eq!(streams.active_count(), 1);

        comment(&store, &a, "for a");
        comment(&store, &b, "for b");
        let updates = streams.drain();
        assert!(updates.iter().all(|update| !matches!(
            update,
            StreamUpdate::Comments { letter_id, .. } if *letter_id == a
        )));
        assert_matches!(
            updates.last(),
            Some(StreamUpdate::Comments { letter_id, comments }) if *letter_id == b && comments.len() == 1
        );
    }

    #[test]
    fn queued_events_from_a_closed_stream_are_dropped() {
        let (store, a, _) = seeded();
        let mut streams = SubscriptionManager::new();
        let handle = streams.subscribe(&store, StreamKey::Comments(a.clone())).unwrap();
        comment(&store, &a, "late");
        assert!(streams.unsubscribe(&store, &handle));
        assert!(streams.drain().is_empty());
    }

    #[test]
    fn unsubscribe_is_idempotent_and_ignores_stale_handles() {
        let (store, a, b) = seeded();
        let mut streams = SubscriptionManager::new();
        let old = streams.subscribe(&store, StreamKey::Comments(a)).unwrap();
        let current = streams.subscribe(&store, StreamKey::Comments(b)).unwrap();
        assert!(!streams.unsubscribe(&store, &old));
        assert_eq!(streams.active(StreamKind::Comments), Some(&current));
        assert!(streams.unsubscribe(&store, &current));
        assert!(!streams.unsubscribe(&store, &current));
        assert!(streams.detach(&store, StreamKind::Comments).is_none());
        assert_eq!(store.live_subscriptions(), 0);
    }

    #[test]
    fn letters_and_comments_streams_coexist() {
        let (store, a, _) = seeded();
        let mut streams = SubscriptionManager::new();
        streams.subscribe(&store, StreamKey::Letters).unwrap();
        streams.subscribe(&store, StreamKey::Comments(a)).unwrap();
        assert_eq!(streams.active_count(), 2);
        let updates = streams.drain();
        assert_matches!(&updates[0], StreamUpdate::Letters(letters) if letters.len() == 2);
        assert_matches!(&updates[1], StreamUpdate::Comments { comments, .. } if comments.is_empty());
    }

    #[test]
    fn failures_surface_once_and_end_the_stream() {
        let (store, _, _) = seeded();
        let mut streams = SubscriptionManager::new();
        streams.subscribe(&store, StreamKey::Letters).unwrap();
        let _ = streams.drain();
        store.fail_subscriptions(StoreError::Unavailable("offline".into()));
        let updates = streams.drain();
        assert_eq!(
            updates,
            vec![StreamUpdate::Failed {
                key: StreamKey::Letters,
                error: StoreError::Unavailable("offline".into()),
            }]
        );
        assert!(streams.active(StreamKind::Letters).is_none());
    }

    #[test]
    fn failed_subscribe_still_drops_the_old_stream() {
        let (store, a, b) = seeded();
        let mut streams = SubscriptionManager::new();
        streams.subscribe(&store, StreamKey::Comments(a)).unwrap();
        store.fail_next(StoreError::Unavailable("nope".into()));
        assert!(streams.subscribe(&store, StreamKey::Comments(b)).is_err());
        assert_eq!(store.live_subscriptions(), 0);
        assert!(streams.active(StreamKind::Comments).is_none());
    }
}
