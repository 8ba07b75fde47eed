use crossbeam_channel::Sender;
use indexmap::IndexMap;
use time::OffsetDateTime;

use crate::error::StoreError;
use crate::model::{Comment, Letter, LetterPatch, NewComment, NewLetter, RecordId};

mod memory;
mod schema;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{init, SqliteStore};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

pub type SnapshotSink = Sender<StoreEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Letters {
        subscription: SubscriptionId,
        letters: Vec<Letter>,
    },
    Comments {
        subscription: SubscriptionId,
        letter_id: RecordId,
        comments: Vec<Comment>,
    },
    Failed {
        subscription: SubscriptionId,
        error: StoreError,
    },
}

impl StoreEvent {
    pub fn subscription(&self) -> SubscriptionId {
        match self {
            StoreEvent::Letters { subscription, .. }
            | StoreEvent::Comments { subscription, .. }
            | StoreEvent::Failed { subscription, .. } => *subscription,
        }
    }
}

pub trait RecordStore {
    /// Registers a live query over all letters. The current snapshot is
    /// pushed immediately, then again after every change.
    fn subscribe_letters(&self, sink: SnapshotSink) -> StoreResult<SubscriptionId>;

    fn subscribe_comments(
        &self,
        letter_id: &RecordId,
        sink: SnapshotSink,
    ) -> StoreResult<SubscriptionId>;

    /// Stops a live query. Unknown or already removed ids are ignored.
    fn unsubscribe(&self, subscription: SubscriptionId);

    fn create_letter(&self, letter: NewLetter) -> StoreResult<RecordId>;

    fn update_letter(&self, id: &RecordId, patch: &LetterPatch) -> StoreResult<()>;

    /// Permanently removes the letter record. Comments are left alone.
    fn delete_letter(&self, id: &RecordId) -> StoreResult<()>;

    fn set_favorite(&self, id: &RecordId, favorite: bool) -> StoreResult<()> {
        self.update_letter(id, &LetterPatch::favorite(favorite))
    }

    fn set_deleted(&self, id: &RecordId, deleted: bool) -> StoreResult<()> {
        self.update_letter(id, &LetterPatch::deleted(deleted))
    }

    fn create_comment(&self, comment: NewComment) -> StoreResult<RecordId>;

    fn update_comment(&self, id: &RecordId, text: &str) -> StoreResult<()>;

    fn delete_comment(&self, id: &RecordId) -> StoreResult<()>;

    fn delete_comments_for(&self, letter_id: &RecordId) -> StoreResult<usize>;
}

#[derive(Debug, Default)]
pub(crate) struct Listeners {
    next_id: u64,
    letters: IndexMap<SubscriptionId, SnapshotSink>,
    comments: IndexMap<SubscriptionId, (RecordId, SnapshotSink)>,
}

impl Listeners {
    pub(crate) fn add_letters(&mut self, sink: SnapshotSink) -> SubscriptionId {
        let id = self.allocate();
        self.letters.insert(id, sink);
        id
    }

    pub(crate) fn add_comments(&mut self, letter_id: RecordId, sink: SnapshotSink) -> SubscriptionId {
        let id = self.allocate();
        self.comments.insert(id, (letter_id, sink));
        id
    }

    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        self.letters.shift_remove(&id).is_some() || self.comments.shift_remove(&id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.letters.len() + self.comments.len()
    }

    pub(crate) fn has_letter_listeners(&self) -> bool {
        !self.letters.is_empty()
    }

    pub(crate) fn send_letters_to(&mut self, id: SubscriptionId, letters: &[Letter]) {
        if let Some(sink) = self.letters.get(&id) {
            let event = StoreEvent::Letters {
                subscription: id,
                letters: letters.to_vec(),
            };
            if sink.send(event).is_err() {
                tracing::debug!(subscription = id.get(), "letters receiver dropped");
                self.letters.shift_remove(&id);
            }
        }
    }

    pub(crate) fn send_comments_to(&mut self, id: SubscriptionId, comments: &[Comment]) {
        if let Some((letter_id, sink)) = self.comments.get(&id) {
            let event = StoreEvent::Comments {
                subscription: id,
                letter_id: letter_id.clone(),
                comments: comments.to_vec(),
            };
            if sink.send(event).is_err() {
                tracing::debug!(subscription = id.get(), "comments receiver dropped");
                self.comments.shift_remove(&id);
            }
        }
    }

    pub(crate) fn broadcast_letters(&mut self, letters: &[Letter]) {
        let ids: Vec<SubscriptionId> = self.letters.keys().copied().collect();
        for id in ids {
            self.send_letters_to(id, letters);
        }
    }

    pub(crate) fn broadcast_comments(&mut self, letter_id: &RecordId, comments: &[Comment]) {
        let ids: Vec<SubscriptionId> = self
            .comments
            .iter()
            .filter(|(_, (watched, _))| watched == letter_id)
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            self.send_comments_to(id, comments);
        }
    }

    pub(crate) fn fail(&mut self, ids: &[SubscriptionId], error: &StoreError) {
        for id in ids {
            let sink = self
                .letters
                .shift_remove(id)
                .or_else(|| self.comments.shift_remove(id).map(|(_, sink)| sink));
            if let Some(sink) = sink {
                let _ = sink.send(StoreEvent::Failed {
                    subscription: *id,
                    error: error.clone(),
                });
            }
        }
    }

    pub(crate) fn letter_subscriptions(&self) -> Vec<SubscriptionId> {
        self.letters.keys().copied().collect()
    }

    pub(crate) fn comment_subscriptions(&self, letter_id: &RecordId) -> Vec<SubscriptionId> {
        self.comments
            .iter()
            .filter(|(_, (watched, _))| watched == letter_id)
            .map(|(id, _)| *id)
            .collect()
    }

    pub(crate) fn all_subscriptions(&self) -> Vec<SubscriptionId> {
        self.letters
            .keys()
            .chain(self.comments.keys())
            .copied()
            .collect()
    }

    fn allocate(&mut self) -> SubscriptionId {
        self.next_id += 1;
        SubscriptionId(self.next_id)
    }
}

pub(crate) fn next_created_at(last: i64) -> i64 {
    let now = i64::try_from(OffsetDateTime::now_utc().unix_timestamp_nanos()).unwrap_or(i64::MAX);
    now.max(last.saturating_add(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn created_at_is_strictly_increasing() {
        let first = next_created_at(0);
        let second = next_created_at(first);
        let far_future = next_created_at(i64::MAX - 10);
        assert!(second > first);
        assert_eq!(far_future, i64::MAX - 9);
    }

    #[test]
    fn dropped_receivers_are_pruned_on_broadcast() {
        let mut listeners = Listeners::default();
        let (tx, rx) = unbounded();
        let id = listeners.add_letters(tx);
        drop(rx);
        listeners.broadcast_letters(&[]);
        assert_eq!(listeners.len(), 0);
        assert!(!listeners.remove(id));
    }

    #[test]
    fn failure_is_reported_once_and_drops_the_listener() {
        let mut listeners = Listeners::default();
        let (tx, rx) = unbounded();
        let id = listeners.add_comments(RecordId::from("a"), tx);
        let error = StoreError::Unavailable("offline".into());
        listeners.fail(&[id], &error);
        listeners.broadcast_comments(&RecordId::from("a"), &[]);
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![StoreEvent::Failed {
                subscription: id,
                error
            }]
        );
    }
}
