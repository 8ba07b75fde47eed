use crate::model::RecordId;
use crate::storage::{RecordStore, StoreResult};

pub struct LetterActions<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> LetterActions<'a, S>
where
    S: RecordStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn toggle_favorite(&self, id: &RecordId, current: bool) -> StoreResult<bool> {
        let favorite = !current;
        self.store.set_favorite(id, favorite)?;
        Ok(favorite)
    }

    pub fn trash(&self, id: &RecordId) -> StoreResult<()> {
        self.store.set_deleted(id, true)
    }

    pub fn restore(&self, id: &RecordId) -> StoreResult<()> {
        self.store.set_deleted(id, false)
    }

    pub fn destroy(&self, id: &RecordId) -> StoreResult<usize> {
        self.store.delete_letter(id)?;
        self.store.delete_comments_for(id)
    }

    pub fn restore_all<'r>(&self, ids: impl IntoIterator<Item = &'r RecordId>) -> StoreResult<usize> {
        let mut restored = 0;
        for id in ids {
            self.restore(id)?;
            restored += 1;
        }
        Ok(restored)
    }

    pub fn empty_trash<'r>(&self, ids: impl IntoIterator<Item = &'r RecordId>) -> StoreResult<usize> {
        let mut destroyed = 0;
        for id in ids {
            self.destroy(id)?;
            destroyed += 1;
        }
        Ok(destroyed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::model::{LetterKind, NewComment, NewLetter};
    use crate::storage::MemoryStore;
    use assert_matches::assert_matches;

    fn letter(store: &MemoryStore, title: &str) -> RecordId {
        store
            .create_letter(NewLetter {
                kind: LetterKind::Letter,
                title: title.into(),
                date: "2025-10-19".into(),
                body: "b".into(),
            })
            .unwrap()
    }

    #[test]
    fn trash_and_restore_keep_identity() {
        let store = MemoryStore::new();
        let id = letter(&store, "a");
        let actions = LetterActions::new(&store);
        actions.trash(&id).unwrap();
        assert!(store.letter(&id).unwrap().deleted);
        actions.restore(&id).unwrap();
        assert!(!store.letter(&id).unwrap().deleted);
    }

    #[test]
    fn destroy_cascades_to_comments() {
        let store = MemoryStore::new();
        let id = letter(&store, "a");
        let other = letter(&store, "b");
        for letter_id in [&id, &id, &other] {
            store
                .create_comment(NewComment {
                    letter_id: letter_id.clone(),
                    author: "x".into(),
                    text: "y".into(),
                })
                .unwrap();
        }
        let removed = LetterActions::new(&store).destroy(&id).unwrap();
        assert_eq!(removed, 2);
        assert!(store.letter(&id).is_none());
        assert_eq!(store.comment_count(), 1);
    }

    #[test]
    fn bulk_operations_stop_at_first_failure() {
        let store = MemoryStore::new();
        let ids = vec![letter(&store, "a"), letter(&store, "b")];
        let actions = LetterActions::new(&store);
        for id in &ids {
            actions.trash(id).unwrap();
        }
        assert_eq!(actions.restore_all(&ids).unwrap(), 2);

        store.fail_next(StoreError::Unavailable("down".into()));
        assert_matches!(actions.empty_trash(&ids), Err(StoreError::Unavailable(_)));
        assert_eq!(store.letters().len(), 2);
    }

    #[test]
    fn toggle_favorite_flips() {
        let store = MemoryStore::new();
        let id = letter(&store, "a");
        let actions = LetterActions::new(&store);
        assert!(actions.toggle_favorite(&id, false).unwrap());
        assert!(!actions.toggle_favorite(&id, true).unwrap());
        assert!(!store.letter(&id).unwrap().favorite);
    }
}
