use std::time::Duration;

use crate::error::{BoardError, Result, StoreError};
use crate::model::{Comment, Letter, LetterPatch, RecordId};
use crate::reveal::{RevealAnimator, RevealState, Scheduler, TimerId};
use crate::storage::RecordStore;
use crate::streams::{StreamKey, StreamKind, SubscriptionManager};

use super::state::{CommentComposer, CommentEdit, LetterDrafts, StreamFault};

pub(crate) struct Wiring<'a, S: ?Sized, C: ?Sized> {
    pub store: &'a S,
    pub streams: &'a mut SubscriptionManager,
    pub scheduler: &'a mut C,
}

#[derive(Debug)]
struct OpenLetter {
    record: Letter,
    drafts: LetterDrafts,
    editing: bool,
}

#[derive(Debug)]
pub struct ModalSession {
    open: Option<OpenLetter>,
    reveal: RevealAnimator,
    comments: Vec<Comment>,
    composer: CommentComposer,
    comment_edit: Option<CommentEdit>,
    fault: Option<StreamFault>,
    last_error: Option<BoardError>,
}

impl ModalSession {
    pub fn new(tick: Duration) -> Self {
        Self {
            open: None,
            reveal: RevealAnimator::new(tick),
            comments: Vec::new(),
            composer: CommentComposer::default(),
            comment_edit: None,
            fault: None,
            last_error: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn open_id(&self) -> Option<&RecordId> {
        self.open.as_ref().map(|open| &open.record.id)
    }

    pub fn open_letter(&self) -> Option<&Letter> {
        self.open.as_ref().map(|open| &open.record)
    }

    pub fn is_editing(&self) -> bool {
        self.open.as_ref().is_some_and(|open| open.editing)
    }

    pub fn drafts(&self) -> Option<&LetterDrafts> {
        self.open.as_ref().map(|open| &open.drafts)
    }

    pub fn drafts_mut(&mut self) -> Option<&mut LetterDrafts> {
        self.open
            .as_mut()
            .filter(|open| open.editing)
            .map(|open| &mut open.drafts)
    }

    pub fn revealed(&self) -> &str {
        self.reveal.revealed()
    }

    pub fn reveal_state(&self) -> &RevealState {
        self.reveal.state()
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn composer(&self) -> &CommentComposer {
        &self.composer
    }

    pub fn composer_mut(&mut self) -> &mut CommentComposer {
        &mut self.composer
    }

    pub fn comment_edit(&self) -> Option<&CommentEdit> {
        self.comment_edit.as_ref()
    }

    pub fn comment_edit_mut(&mut self) -> Option<&mut CommentEdit> {
        self.comment_edit.as_mut()
    }

    pub fn fault(&self) -> Option<&StreamFault> {
        self.fault.as_ref()
    }

    pub fn last_error(&self) -> Option<&BoardError> {
        self.last_error.as_ref()
    }

    pub(crate) fn open<S, C>(&mut self, letter: &Letter, wiring: Wiring<'_, S, C>) -> Result<()>
    where
        S: RecordStore + ?Sized,
        C: Scheduler + ?Sized,
    {
        self.open = Some(OpenLetter {
            record: letter.clone(),
            drafts: LetterDrafts::from_letter(letter),
            editing: false,
        });
        self.comments.clear();
        self.comment_edit = None;
        self.composer.clear_text();
        self.fault = None;
        self.last_error = None;
        self.reveal.start(&letter.id, &letter.body, wiring.scheduler);
        tracing::debug!(letter = %letter.id, kind = %letter.kind, "letter opened");

        if !letter.kind.supports_comments() {
            wiring.streams.detach(wiring.store, StreamKind::Comments);
            return Ok(());
        }
        let key = StreamKey::Comments(letter.id.clone());
        if let Err(error) = wiring.streams.subscribe(wiring.store, key.clone()) {
            tracing::warn!(letter = %letter.id, %error, "comments stream unavailable");
            self.fault = Some(StreamFault {
                key,
                error: error.clone(),
            });
            return Err(error.into());
        }
        Ok(())
    }

    pub(crate) fn close<S, C>(&mut self, wiring: Wiring<'_, S, C>)
    where
        S: RecordStore + ?Sized,
        C: Scheduler + ?Sized,
    {
        self.reveal.cancel(wiring.scheduler);
        wiring.streams.detach(wiring.store, StreamKind::Comments);
        if let Some(open) = self.open.take() {
            tracing::debug!(letter = %open.record.id, "letter closed");
        }
        self.comments.clear();
        self.comment_edit = None;
        self.composer.clear_text();
        self.fault = None;
        self.last_error = None;
    }

    pub(crate) fn enter_edit<C>(&mut self, scheduler: &mut C) -> bool
    where
        C: Scheduler + ?Sized,
    {
        let Some(open) = self.open.as_mut().filter(|open| !open.editing) else {
            return false;
        };
        open.drafts = LetterDrafts::from_letter(&open.record);
        open.editing = true;
        self.reveal.suspend(scheduler);
        true
    }

    pub(crate) fn cancel_edit<C>(&mut self, scheduler: &mut C) -> bool
    where
        C: Scheduler + ?Sized,
    {
        let Some(open) = self.open.as_mut().filter(|open| open.editing) else {
            return false;
        };
        open.drafts = LetterDrafts::from_letter(&open.record);
        open.editing = false;
        self.reveal
            .start(&open.record.id, &open.record.body, scheduler);
        true
    }

    pub(crate) fn save_edit<S, C>(
        &mut self,
        untitled: &str,
        store: &S,
        scheduler: &mut C,
    ) -> Result<Option<Letter>>
    where
        S: RecordStore + ?Sized,
        C: Scheduler + ?Sized,
    {
        let Some(open) = self.open.as_mut().filter(|open| open.editing) else {
            return Ok(None);
        };
        let title = match open.drafts.title.trim() {
            "" => untitled.to_owned(),
            title => title.to_owned(),
        };
        let patch = LetterPatch {
            title: Some(title),
            date: Some(open.drafts.date.trim().to_owned()),
            body: Some(open.drafts.body.trim().to_owned()),
            ..LetterPatch::default()
        };

        if let Err(error) = store.update_letter(&open.record.id, &patch) {
            tracing::error!(letter = %open.record.id, %error, "saving letter failed");
            let error = BoardError::from(error);
            self.last_error = Some(error.clone());
            return Err(error);
        }

        patch.apply(&mut open.record);
        open.drafts = LetterDrafts::from_letter(&open.record);
        open.editing = false;
        self.last_error = None;
        self.reveal
            .start(&open.record.id, &open.record.body, scheduler);
        tracing::info!(letter = %open.record.id, "letter saved");
        Ok(Some(open.record.clone()))
    }

    pub(crate) fn reconcile<S, C>(&mut self, letters: &[Letter], wiring: Wiring<'_, S, C>) -> bool
    where
        S: RecordStore + ?Sized,
        C: Scheduler + ?Sized,
    {
        let Some(open) = self.open.as_mut() else {
            return false;
        };
        let Some(fresh) = letters
            .iter()
            .find(|letter| letter.id == open.record.id && !letter.deleted)
        else {
            tracing::info!(letter = %open.record.id, "open letter removed or trashed, closing");
            self.close(wiring);
            return true;
        };
        if *fresh == open.record {
            return false;
        }
        let body_changed = fresh.body != open.record.body;
        open.record = fresh.clone();
        if !open.editing {
            open.drafts = LetterDrafts::from_letter(&open.record);
            if body_changed {
                self.reveal
                    .start(&open.record.id, &open.record.body, wiring.scheduler);
            }
        }
        false
    }

    pub(crate) fn on_comments(&mut self, letter_id: &RecordId, comments: Vec<Comment>) -> bool {
        if self.open_id() != Some(letter_id) {
            return false;
        }
        if let Some(edit) = &self.comment_edit {
            if !comments.iter().any(|comment| comment.id == edit.comment_id) {
                self.comment_edit = None;
            }
        }
        self.comments = comments;
        true
    }

    pub(crate) fn on_comments_failed(&mut self, key: StreamKey, error: StoreError) {
        self.fault = Some(StreamFault { key, error });
    }

    pub(crate) fn set_favorite_local(&mut self, id: &RecordId, favorite: bool) {
        if let Some(open) = self.open.as_mut().filter(|open| &open.record.id == id) {
            open.record.favorite = favorite;
        }
    }

    pub(crate) fn tick<C>(&mut self, timer: TimerId, scheduler: &mut C) -> bool
    where
        C: Scheduler + ?Sized,
    {
        if self.open_id().is_none() || self.reveal.letter() != self.open_id() {
            return false;
        }
        self.reveal.tick(timer, scheduler).is_some()
    }

    pub(crate) fn add_comment<S>(&mut self, default_author: &str, store: &S) -> Result<Option<RecordId>>
    where
        S: RecordStore + ?Sized,
    {
        let Some(letter_id) = self
            .open
            .as_ref()
            .filter(|open| open.record.kind.supports_comments())
            .map(|open| open.record.id.clone())
        else {
            return Ok(None);
        };
        let Some(comment) = self.composer.build(&letter_id, default_author) else {
            return Ok(None);
        };
        let id = self.remember(store.create_comment(comment))?;
        self.composer.clear_text();
        tracing::info!(letter = %letter_id, comment = %id, "comment added");
        Ok(Some(id))
    }

    pub(crate) fn start_comment_edit(&mut self, comment_id: &RecordId) -> bool {
        let Some(comment) = self.comments.iter().find(|comment| &comment.id == comment_id) else {
            return false;
        };
        self.comment_edit = Some(CommentEdit::new(comment));
        true
    }

    pub(crate) fn cancel_comment_edit(&mut self) {
        self.comment_edit = None;
    }

    pub(crate) fn save_comment_edit<S>(&mut self, store: &S) -> Result<bool>
    where
        S: RecordStore + ?Sized,
    {
        let Some(edit) = self.comment_edit.as_mut() else {
            return Ok(false);
        };
        let Some(text) = edit.validated() else {
            return Ok(false);
        };
        let comment_id = edit.comment_id.clone();
        self.remember(store.update_comment(&comment_id, &text))?;
        self.comment_edit = None;
        tracing::info!(comment = %comment_id, "comment updated");
        Ok(true)
    }

    pub(crate) fn delete_comment<S>(&mut self, comment_id: &RecordId, store: &S) -> Result<()>
    where
        S: RecordStore + ?Sized,
    {
        self.remember(store.delete_comment(comment_id))?;
        if self
            .comment_edit
            .as_ref()
            .is_some_and(|edit| &edit.comment_id == comment_id)
        {
            self.comment_edit = None;
        }
        tracing::info!(comment = %comment_id, "comment deleted");
        Ok(())
    }

    fn remember<T>(&mut self, result: std::result::Result<T, StoreError>) -> Result<T> {
        result.map_err(|error| {
            tracing::error!(%error, "comment mutation failed");
            let error = BoardError::from(error);
            self.last_error = Some(error.clone());
            error
        })
    }
}
