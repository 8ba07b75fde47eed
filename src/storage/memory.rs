use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{next_created_at, Listeners, RecordStore, SnapshotSink, StoreResult, SubscriptionId};
use crate::error::StoreError;
use crate::model::{Comment, Letter, LetterPatch, NewComment, NewLetter, RecordId};

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    letters: Vec<Letter>,
    comments: Vec<Comment>,
    listeners: Listeners,
    last_letter_stamp: i64,
    last_comment_stamp: i64,
    failures: VecDeque<StoreError>,
}

impl Inner {
    fn take_failure(&mut self) -> StoreResult<()> {
        match self.failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn letters_snapshot(&self) -> Vec<Letter> {
        let mut letters = self.letters.clone();
        letters.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        letters
    }

    fn comments_snapshot(&self, letter_id: &RecordId) -> Vec<Comment> {
        let mut comments: Vec<Comment> = self
            .comments
            .iter()
            .filter(|comment| &comment.letter_id == letter_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        comments
    }

    fn publish_letters(&mut self) {
        let snapshot = self.letters_snapshot();
        self.listeners.broadcast_letters(&snapshot);
    }

    fn publish_comments(&mut self, letter_id: &RecordId) {
        let snapshot = self.comments_snapshot(letter_id);
        self.listeners.broadcast_comments(letter_id, &snapshot);
    }

    fn letter_mut(&mut self, id: &RecordId) -> StoreResult<&mut Letter> {
        self.letters
            .iter_mut()
            .find(|letter| &letter.id == id)
            .ok_or_else(|| StoreError::NotFound {
                kind: "letter",
                id: id.clone(),
            })
    }

    fn comment_mut(&mut self, id: &RecordId) -> StoreResult<&mut Comment> {
        self.comments
            .iter_mut()
            .find(|comment| &comment.id == id)
            .ok_or_else(|| StoreError::NotFound {
                kind: "comment",
                id: id.clone(),
            })
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, error: StoreError) {
        self.inner.lock().failures.push_back(error);
    }

    pub fn fail_subscriptions(&self, error: StoreError) {
        let mut inner = self.inner.lock();
        let ids = inner.listeners.all_subscriptions();
        inner.listeners.fail(&ids, &error);
    }

    pub fn live_subscriptions(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    pub fn letters(&self) -> Vec<Letter> {
        self.inner.lock().letters_snapshot()
    }

    pub fn letter(&self, id: &RecordId) -> Option<Letter> {
        self.inner
            .lock()
            .letters
            .iter()
            .find(|letter| &letter.id == id)
            .cloned()
    }

    pub fn comments_for(&self, letter_id: &RecordId) -> Vec<Comment> {
        self.inner.lock().comments_snapshot(letter_id)
    }

    pub fn comment_count(&self) -> usize {
        self.inner.lock().comments.len()
    }
}

impl RecordStore for MemoryStore {
    fn subscribe_letters(&self, sink: SnapshotSink) -> StoreResult<SubscriptionId> {
        let mut inner = self.inner.lock();
        inner.take_failure()?;
        let snapshot = inner.letters_snapshot();
        let id = inner.listeners.add_letters(sink);
        inner.listeners.send_letters_to(id, &snapshot);
        Ok(id)
    }

    fn subscribe_comments(
        &self,
        letter_id: &RecordId,
        sink: SnapshotSink,
    ) -> StoreResult<SubscriptionId> {
        let mut inner = self.inner.lock();
        inner.take_failure()?;
        let snapshot = inner.comments_snapshot(letter_id);
        let id = inner.listeners.add_comments(letter_id.clone(), sink);
        inner.listeners.send_comments_to(id, &snapshot);
        Ok(id)
    }

    fn unsubscribe(&self, subscription: SubscriptionId) {
        self.inner.lock().listeners.remove(subscription);
    }

    fn create_letter(&self, letter: NewLetter) -> StoreResult<RecordId> {
        let mut inner = self.inner.lock();
        inner.take_failure()?;
        let id = RecordId::generate();
        let created_at = next_created_at(inner.last_letter_stamp);
        inner.last_letter_stamp = created_at;
        inner.letters.push(Letter {
            id: id.clone(),
            kind: letter.kind,
            title: letter.title,
            date: letter.date,
            body: letter.body,
            favorite: false,
            deleted: false,
            created_at,
        });
        inner.publish_letters();
        Ok(id)
    }

    fn update_letter(&self, id: &RecordId, patch: &LetterPatch) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.take_failure()?;
        let letter = inner.letter_mut(id)?;
        patch.apply(letter);
        inner.publish_letters();
        Ok(())
    }

    fn delete_letter(&self, id: &RecordId) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.take_failure()?;
        let before = inner.letters.len();
        inner.letters.retain(|letter| &letter.id != id);
        if inner.letters.len() == before {
            return Err(StoreError::NotFound {
                kind: "letter",
                id: id.clone(),
            });
        }
        inner.publish_letters();
        Ok(())
    }

    fn create_comment(&self, comment: NewComment) -> StoreResult<RecordId> {
        let mut inner = self.inner.lock();
        inner.take_failure()?;
        let id = RecordId::generate();
        let created_at = next_created_at(inner.last_comment_stamp);
        inner.last_comment_stamp = created_at;
        let letter_id = comment.letter_id.clone();
        inner.comments.push(Comment {
            id: id.clone(),
            letter_id: comment.letter_id,
            author: comment.author,
            text: comment.text,
            created_at,
        });
        inner.publish_comments(&letter_id);
        Ok(id)
    }

    fn update_comment(&self, id: &RecordId, text: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.take_failure()?;
        let comment = inner.comment_mut(id)?;
        comment.text = text.to_owned();
        let letter_id = comment.letter_id.clone();
        inner.publish_comments(&letter_id);
        Ok(())
    }

    fn delete_comment(&self, id: &RecordId) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.take_failure()?;
        let letter_id = inner.comment_mut(id)?.letter_id.clone();
        inner.comments.retain(|comment| &comment.id != id);
        inner.publish_comments(&letter_id);
        Ok(())
    }

    fn delete_comments_for(&self, letter_id: &RecordId) -> StoreResult<usize> {
        let mut inner = self.inner.lock();
        inner.take_failure()?;
        let before = inner.comments.len();
        inner.comments.retain(|comment| &comment.letter_id != letter_id);
        let removed = before - inner.comments.len();
        inner.publish_comments(letter_id);
        Ok(removed)
    }
}
