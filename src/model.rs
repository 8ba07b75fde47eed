use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use time::OffsetDateTime;
use uuid::Uuid;

const PREVIEW_MAX_CHARS: usize = 260;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum LetterKind {
    #[default]
    Letter,
    Envelope,
}

impl LetterKind {
    pub fn supports_comments(self) -> bool {
        matches!(self, LetterKind::Letter)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Letter {
    pub id: RecordId,
    pub kind: LetterKind,
    pub title: String,
    // Display and search only; board order comes from `created_at`.
    pub date: String,
    pub body: String,
    pub favorite: bool,
    pub deleted: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLetter {
    pub kind: LetterKind,
    pub title: String,
    pub date: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LetterPatch {
    pub title: Option<String>,
    pub date: Option<String>,
    pub body: Option<String>,
    pub favorite: Option<bool>,
    pub deleted: Option<bool>,
}

impl LetterPatch {
    pub fn favorite(value: bool) -> Self {
        Self {
            favorite: Some(value),
            ..Self::default()
        }
    }

    pub fn deleted(value: bool) -> Self {
        Self {
            deleted: Some(value),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.date.is_none()
            && self.body.is_none()
            && self.favorite.is_none()
            && self.deleted.is_none()
    }

    pub fn apply(&self, letter: &mut Letter) {
        if let Some(title) = &self.title {
            letter.title.clone_from(title);
        }
        if let Some(date) = &self.date {
            letter.date.clone_from(date);
        }
        if let Some(body) = &self.body {
            letter.body.clone_from(body);
        }
        if let Some(favorite) = self.favorite {
            letter.favorite = favorite;
        }
        if let Some(deleted) = self.deleted {
            letter.deleted = deleted;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Comment {
    pub id: RecordId,
    pub letter_id: RecordId,
    pub author: String,
    pub text: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub letter_id: RecordId,
    pub author: String,
    pub text: String,
}

pub fn today_utc() -> String {
    OffsetDateTime::now_utc().date().to_string()
}

pub fn preview(body: &str, lines: usize) -> String {
    let trimmed = body.trim();
    let joined = trimmed.split('\n').take(lines).collect::<Vec<_>>().join(" ");
    let short = if joined.chars().count() > PREVIEW_MAX_CHARS {
        let mut cut: String = joined.chars().take(PREVIEW_MAX_CHARS).collect();
        cut.push_str("...");
        cut
    } else {
        joined
    };
    if short.is_empty() {
        body.chars().take(PREVIEW_MAX_CHARS).collect()
    } else {
        short
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn today_is_iso_date() {
        let today = today_utc();
        assert_eq!(today.len(), 10);
        assert_eq!(today.as_bytes()[4], b'-');
        assert_eq!(today.as_bytes()[7], b'-');
    }

    #[test]
    fn patch_only_touches_present_fields() {
        let mut letter = Letter {
            id: RecordId::from("a"),
            title: "hi".into(),
            body: "hello".into(),
            ..Letter::default()
        };
        LetterPatch::favorite(true).apply(&mut letter);
        assert!(letter.favorite);
        assert_eq!(letter.title, "hi");
        assert_eq!(letter.body, "hello");
        assert!(!LetterPatch::deleted(false).is_empty());
        assert!(LetterPatch::default().is_empty());
    }

    #[test]
    fn letter_with_missing_fields_deserializes_to_defaults() {
        let letter: Letter = serde_json::from_str(r#"{"id":"x1","createdAt":7}"#).unwrap();
        assert_eq!(letter.id.as_str(), "x1");
        assert_eq!(letter.kind, LetterKind::Letter);
        assert!(letter.title.is_empty());
        assert!(!letter.deleted);
        assert_eq!(letter.created_at, 7);
    }

    #[test]
    fn preview_joins_leading_lines() {
        assert_eq!(preview("one\ntwo\nthree\nfour", 3), "one two three");
        let long = "x".repeat(300);
        let cut = preview(&long, 3);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 263);
    }

    #[test]
    fn envelope_has_no_comment_thread() {
        assert!(LetterKind::Letter.supports_comments());
        assert!(!LetterKind::Envelope.supports_comments());
        assert_eq!("envelope".parse::<LetterKind>().unwrap(), LetterKind::Envelope);
        assert_eq!(LetterKind::Envelope.as_ref(), "envelope");
    }
}
