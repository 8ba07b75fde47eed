use crate::error::{BoardError, StoreError, ValidationError};
use crate::model::{Comment, Letter, LetterKind, NewComment, NewLetter, RecordId};
use crate::search::{self, LetterFilter};
use crate::streams::StreamKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFault {
    pub key: StreamKey,
    pub error: StoreError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposeForm {
    pub kind: LetterKind,
    pub title: String,
    pub date: String,
    pub body: String,
    pub feedback: Option<ValidationError>,
}

impl ComposeForm {
    pub fn build(&mut self, today: &str) -> Option<NewLetter> {
        let title = self.title.trim();
        let body = self.body.trim();
        self.feedback = if title.is_empty() {
            Some(ValidationError::EmptyTitle)
        } else if body.is_empty() {
            Some(ValidationError::EmptyBody)
        } else {
            None
        };
        if self.feedback.is_some() {
            return None;
        }
        let date = match self.date.trim() {
            "" => today.to_owned(),
            date => date.to_owned(),
        };
        Some(NewLetter {
            kind: self.kind,
            title: title.to_owned(),
            date,
            body: body.to_owned(),
        })
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LetterDrafts {
    pub title: String,
    pub date: String,
    pub body: String,
}

impl LetterDrafts {
    pub fn from_letter(letter: &Letter) -> Self {
        Self {
            title: letter.title.clone(),
            date: letter.date.clone(),
            body: letter.body.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentComposer {
    pub author: String,
    pub text: String,
    pub feedback: Option<ValidationError>,
}

impl CommentComposer {
    pub fn build(&mut self, letter_id: &RecordId, default_author: &str) -> Option<NewComment> {
        let text = self.text.trim();
        if text.is_empty() {
            self.feedback = Some(ValidationError::EmptyComment);
            return None;
        }
        self.feedback = None;
        let author = match self.author.trim() {
            "" => default_author.to_owned(),
            author => author.to_owned(),
        };
        Some(NewComment {
            letter_id: letter_id.clone(),
            author,
            text: text.to_owned(),
        })
    }

    pub fn clear_text(&mut self) {
        self.text.clear();
        self.feedback = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentEdit {
    pub comment_id: RecordId,
    pub text: String,
    pub feedback: Option<ValidationError>,
}

impl CommentEdit {
    pub fn new(comment: &Comment) -> Self {
        Self {
            comment_id: comment.id.clone(),
            text: comment.text.clone(),
            feedback: None,
        }
    }

    pub fn validated(&mut self) -> Option<String> {
        let text = self.text.trim();
        if text.is_empty() {
            self.feedback = Some(ValidationError::EmptyComment);
            return None;
        }
        self.feedback = None;
        Some(text.to_owned())
    }
}

#[derive(Debug, Default)]
pub struct BoardState {
    letters: Vec<Letter>,
    loaded: bool,
    pub filter: LetterFilter,
    pub compose: ComposeForm,
    letters_fault: Option<StreamFault>,
    last_error: Option<BoardError>,
}

impl BoardState {
    pub fn letters(&self) -> &[Letter] {
        &self.letters
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn apply_snapshot(&mut self, letters: Vec<Letter>) {
        self.letters = letters;
        self.loaded = true;
    }

    pub fn letter(&self, id: &RecordId) -> Option<&Letter> {
        self.letters.iter().find(|letter| &letter.id == id)
    }

    pub fn letter_mut(&mut self, id: &RecordId) -> Option<&mut Letter> {
        self.letters.iter_mut().find(|letter| &letter.id == id)
    }

    pub fn replace_letter(&mut self, updated: Letter) {
        if let Some(letter) = self.letter_mut(&updated.id) {
            *letter = updated;
        }
    }

    pub fn remove_letter(&mut self, id: &RecordId) {
        self.letters.retain(|letter| &letter.id != id);
    }

    pub fn visible(&self) -> Vec<&Letter> {
        search::visible(&self.letters, &self.filter)
    }

    pub fn trashed(&self) -> Vec<&Letter> {
        search::trashed(&self.letters, &self.filter.query)
    }

    pub fn letters_fault(&self) -> Option<&StreamFault> {
        self.letters_fault.as_ref()
    }

    pub fn set_letters_fault(&mut self, fault: Option<StreamFault>) {
        self.letters_fault = fault;
    }

    pub fn last_error(&self) -> Option<&BoardError> {
        self.last_error.as_ref()
    }

    pub fn set_error(&mut self, error: BoardError) {
        self.last_error = Some(error);
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_defaults_date_and_trims() {
        let mut form = ComposeForm {
            title: "  hi ".into(),
            body: "hello\n".into(),
            ..ComposeForm::default()
        };
        let letter = form.build("2025-10-19").unwrap();
        assert_eq!(letter.title, "hi");
        assert_eq!(letter.date, "2025-10-19");
        assert_eq!(letter.body, "hello");
        assert_eq!(letter.kind, LetterKind::Letter);
        assert_eq!(form.title, "  hi ", "drafts stay until the create is acknowledged");
    }

    #[test]
    fn compose_refuses_blank_fields() {
        let mut form = ComposeForm {
            title: "   ".into(),
            body: "x".into(),
            ..ComposeForm::default()
        };
        assert!(form.build("2025-10-19").is_none());
        assert_eq!(form.feedback, Some(ValidationError::EmptyTitle));

        form.title = "t".into();
        form.body = "\n".into();
        assert!(form.build("2025-10-19").is_none());
        assert_eq!(form.feedback, Some(ValidationError::EmptyBody));
    }

    #[test]
    fn composer_substitutes_author_and_keeps_it() {
        let mut composer = CommentComposer {
            text: "hey".into(),
            ..CommentComposer::default()
        };
        let comment = composer.build(&RecordId::from("a"), "someone").unwrap();
        assert_eq!(comment.author, "someone");

        composer.author = " Ann ".into();
        composer.clear_text();
        assert!(composer.build(&RecordId::from("a"), "someone").is_none());
        assert_eq!(composer.feedback, Some(ValidationError::EmptyComment));
        assert_eq!(composer.author, " Ann ");
    }

    #[test]
    fn replace_and_remove_only_touch_known_ids() {
        let mut state = BoardState::default();
        assert!(!state.is_loaded());
        state.apply_snapshot(vec![Letter {
            id: RecordId::from("a"),
            ..Letter::default()
        }]);
        state.replace_letter(Letter {
            id: RecordId::from("zzz"),
            ..Letter::default()
        });
        assert_eq!(state.letters().len(), 1);
        state.remove_letter(&RecordId::from("a"));
        assert!(state.letters().is_empty());
        assert!(state.is_loaded());
    }
}
