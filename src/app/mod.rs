use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::{BoardError, Result};
use crate::model::{today_utc, Letter, RecordId};
use crate::reveal::{Scheduler, TimerId};
use crate::search::LetterFilter;
use crate::storage::RecordStore;
use crate::streams::{StreamKey, StreamKind, StreamUpdate, SubscriptionManager};

mod actions;
mod modal;
pub mod state;

pub use actions::LetterActions;
pub use modal::ModalSession;
pub use state::{
    BoardState, CommentComposer, CommentEdit, ComposeForm, LetterDrafts, StreamFault,
};

use modal::Wiring;

macro_rules! wiring {
    ($board:expr) => {
        Wiring {
            store: &$board.store,
            streams: &mut $board.streams,
            scheduler: &mut $board.scheduler,
        }
    };
}

pub struct Board<S, C> {
    config: Arc<AppConfig>,
    store: S,
    streams: SubscriptionManager,
    scheduler: C,
    state: BoardState,
    modal: ModalSession,
}

impl<S, C> Board<S, C>
where
    S: RecordStore,
    C: Scheduler,
{
    pub fn new(config: Arc<AppConfig>, store: S, scheduler: C) -> Self {
        let modal = ModalSession::new(config.reveal.tick_interval());
        Self {
            config,
            store,
            streams: SubscriptionManager::new(),
            scheduler,
            state: BoardState::default(),
            modal,
        }
    }

    pub fn connect(&mut self) -> Result<()> {
        if let Err(error) = self.streams.subscribe(&self.store, StreamKey::Letters) {
            tracing::error!(%error, "letters stream unavailable");
            self.state.set_letters_fault(Some(StreamFault {
                key: StreamKey::Letters,
                error: error.clone(),
            }));
            return Err(error.into());
        }
        self.state.set_letters_fault(None);
        self.pump();
        Ok(())
    }

    pub fn reconnect_letters(&mut self) -> Result<()> {
        tracing::info!("reconnecting letters stream");
        self.connect()
    }

    pub fn disconnect(&mut self) {
        self.modal.close(wiring!(self));
        self.streams.detach(&self.store, StreamKind::Letters);
    }

    pub fn pump(&mut self) -> usize {
        let updates = self.streams.drain();
        let applied = updates.len();
        for update in updates {
            match update {
                StreamUpdate::Letters(letters) => {
                    self.state.apply_snapshot(letters);
                    self.modal.reconcile(self.state.letters(), wiring!(self));
                }
                StreamUpdate::Comments {
                    letter_id,
                    comments,
                } => {
                    self.modal.on_comments(&letter_id, comments);
                }
                StreamUpdate::Failed { key, error } => match key {
                    StreamKey::Letters => {
                        self.state.set_letters_fault(Some(StreamFault { key, error }));
                    }
                    StreamKey::Comments(_) => self.modal.on_comments_failed(key, error),
                },
            }
        }
        applied
    }

    pub fn fire_timer(&mut self, timer: TimerId) -> bool {
        self.modal.tick(timer, &mut self.scheduler)
    }

    pub fn visible_letters(&self) -> Vec<&Letter> {
        self.state.visible()
    }

    pub fn trashed_letters(&self) -> Vec<&Letter> {
        self.state.trashed()
    }

    pub fn letters(&self) -> &[Letter] {
        self.state.letters()
    }

    pub fn letter(&self, id: &RecordId) -> Option<&Letter> {
        self.state.letter(id)
    }

    pub fn filter(&self) -> &LetterFilter {
        &self.state.filter
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.state.filter.query = query.into();
    }

    pub fn set_favorites_only(&mut self, favorites_only: bool) {
        self.state.filter.favorites_only = favorites_only;
    }

    pub fn compose(&self) -> &ComposeForm {
        &self.state.compose
    }

    pub fn compose_mut(&mut self) -> &mut ComposeForm {
        &mut self.state.compose
    }

    pub fn submit_compose(&mut self) -> Result<Option<RecordId>> {
        let Some(letter) = self.state.compose.build(&today_utc()) else {
            return Ok(None);
        };
        let result = self.store.create_letter(letter).map_err(BoardError::from);
        let id = self.remember(result)?;
        self.state.compose.clear();
        tracing::info!(letter = %id, "letter created");
        Ok(Some(id))
    }

    pub fn open(&mut self, id: &RecordId) -> Result<()> {
        let Some(letter) = self.state.letter(id).filter(|letter| !letter.deleted).cloned() else {
            return Err(BoardError::UnknownLetter(id.clone()));
        };
        self.modal.open(&letter, wiring!(self))
    }

    pub fn close(&mut self) {
        self.modal.close(wiring!(self));
    }

    pub fn modal(&self) -> &ModalSession {
        &self.modal
    }

    pub fn modal_mut(&mut self) -> &mut ModalSession {
        &mut self.modal
    }

    pub fn enter_edit(&mut self) -> bool {
        self.modal.enter_edit(&mut self.scheduler)
    }

    pub fn cancel_edit(&mut self) -> bool {
        self.modal.cancel_edit(&mut self.scheduler)
    }

    pub fn drafts_mut(&mut self) -> Option<&mut LetterDrafts> {
        self.modal.drafts_mut()
    }

    pub fn save_edit(&mut self) -> Result<()> {
        let saved = self.modal.save_edit(
            &self.config.letters.untitled,
            &self.store,
            &mut self.scheduler,
        );
        if let Some(letter) = self.remember(saved)? {
            self.state.replace_letter(letter);
        }
        Ok(())
    }

    pub fn toggle_favorite(&mut self, id: &RecordId) -> Result<bool> {
        let current = self.known(id)?.favorite;
        let result = LetterActions::new(&self.store).toggle_favorite(id, current);
        let favorite = self.remember(result.map_err(BoardError::from))?;
        if let Some(letter) = self.state.letter_mut(id) {
            letter.favorite = favorite;
        }
        self.modal.set_favorite_local(id, favorite);
        tracing::info!(letter = %id, favorite, "favorite toggled");
        Ok(favorite)
    }

    pub fn trash(&mut self, id: &RecordId) -> Result<()> {
        self.known(id)?;
        let result = LetterActions::new(&self.store).trash(id);
        self.remember(result.map_err(BoardError::from))?;
        self.set_deleted_local(id, true);
        if self.modal.open_id() == Some(id) {
            self.modal.close(wiring!(self));
        }
        tracing::info!(letter = %id, "letter moved to trash");
        Ok(())
    }

    pub fn restore(&mut self, id: &RecordId) -> Result<()> {
        self.known(id)?;
        let result = LetterActions::new(&self.store).restore(id);
        self.remember(result.map_err(BoardError::from))?;
        self.set_deleted_local(id, false);
        tracing::info!(letter = %id, "letter restored");
        Ok(())
    }

    pub fn destroy(&mut self, id: &RecordId) -> Result<usize> {
        self.known(id)?;
        let result = LetterActions::new(&self.store).destroy(id);
        let comments = self.remember(result.map_err(BoardError::from))?;
        self.forget_letter(id);
        tracing::info!(letter = %id, comments, "letter destroyed");
        Ok(comments)
    }

    pub fn restore_all(&mut self) -> Result<usize> {
        let ids = self.trashed_ids();
        let result = LetterActions::new(&self.store).restore_all(&ids);
        let restored = self.remember(result.map_err(BoardError::from))?;
        for id in &ids {
            self.set_deleted_local(id, false);
        }
        tracing::info!(restored, "trash restored");
        Ok(restored)
    }

    pub fn empty_trash(&mut self) -> Result<usize> {
        let ids = self.trashed_ids();
        let result = LetterActions::new(&self.store).empty_trash(&ids);
        let destroyed = self.remember(result.map_err(BoardError::from))?;
        for id in &ids {
            self.forget_letter(id);
        }
        tracing::info!(destroyed, "trash emptied");
        Ok(destroyed)
    }

    pub fn comment_composer_mut(&mut self) -> &mut CommentComposer {
        self.modal.composer_mut()
    }

    pub fn add_comment(&mut self) -> Result<Option<RecordId>> {
        self.modal
            .add_comment(&self.config.comments.default_author, &self.store)
    }

    pub fn start_comment_edit(&mut self, comment_id: &RecordId) -> bool {
        self.modal.start_comment_edit(comment_id)
    }

    pub fn comment_edit_mut(&mut self) -> Option<&mut CommentEdit> {
        self.modal.comment_edit_mut()
    }

    pub fn cancel_comment_edit(&mut self) {
        self.modal.cancel_comment_edit();
    }

    pub fn save_comment_edit(&mut self) -> Result<bool> {
        self.modal.save_comment_edit(&self.store)
    }

    pub fn delete_comment(&mut self, comment_id: &RecordId) -> Result<()> {
        self.modal.delete_comment(comment_id, &self.store)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn scheduler(&self) -> &C {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut C {
        &mut self.scheduler
    }

    pub fn streams(&self) -> &SubscriptionManager {
        &self.streams
    }

    pub fn is_loaded(&self) -> bool {
        self.state.is_loaded()
    }

    pub fn letters_fault(&self) -> Option<&StreamFault> {
        self.state.letters_fault()
    }

    pub fn last_error(&self) -> Option<&BoardError> {
        self.state.last_error()
    }

    pub fn clear_error(&mut self) {
        self.state.clear_error();
    }

    fn known(&self, id: &RecordId) -> Result<&Letter> {
        self.state
            .letter(id)
            .ok_or_else(|| BoardError::UnknownLetter(id.clone()))
    }

    fn trashed_ids(&self) -> Vec<RecordId> {
        self.state
            .letters()
            .iter()
            .filter(|letter| letter.deleted)
            .map(|letter| letter.id.clone())
            .collect()
    }

    fn set_deleted_local(&mut self, id: &RecordId, deleted: bool) {
        if let Some(letter) = self.state.letter_mut(id) {
            letter.deleted = deleted;
        }
    }

    fn forget_letter(&mut self, id: &RecordId) {
        self.state.remove_letter(id);
        if self.modal.open_id() == Some(id) {
            self.modal.close(wiring!(self));
        }
    }

    fn remember<T>(&mut self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.state.clear_error();
                Ok(value)
            }
            Err(error) => {
                tracing::error!(%error, "board mutation failed");
                self.state.set_error(error.clone());
                Err(error)
            }
        }
    }
}
