use crate::model::Letter;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LetterFilter {
    pub query: String,
    pub favorites_only: bool,
}

impl LetterFilter {
    pub fn new(query: impl Into<String>, favorites_only: bool) -> Self {
        Self {
            query: query.into(),
            favorites_only,
        }
    }

    fn needle(&self) -> Option<String> {
        let trimmed = self.query.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_lowercase())
        }
    }

    pub fn is_active(&self) -> bool {
        self.favorites_only || self.needle().is_some()
    }
}

fn matches_text(letter: &Letter, needle: Option<&str>) -> bool {
    let Some(needle) = needle else {
        return true;
    };
    [&letter.title, &letter.date, &letter.body]
        .into_iter()
        .any(|field| field.to_lowercase().contains(needle))
}

pub fn visible<'a>(letters: &'a [Letter], filter: &LetterFilter) -> Vec<&'a Letter> {
    let needle = filter.needle();
    letters
        .iter()
        .filter(|letter| !letter.deleted)
        .filter(|letter| !filter.favorites_only || letter.favorite)
        .filter(|letter| matches_text(letter, needle.as_deref()))
        .collect()
}

pub fn trashed<'a>(letters: &'a [Letter], query: &str) -> Vec<&'a Letter> {
    let needle = LetterFilter::new(query, false).needle();
    letters
        .iter()
        .filter(|letter| letter.deleted)
        .filter(|letter| matches_text(letter, needle.as_deref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecordId;

    fn letter(id: &str, title: &str, date: &str, body: &str) -> Letter {
        Letter {
            id: RecordId::from(id),
            title: title.into(),
            date: date.into(),
            body: body.into(),
            ..Letter::default()
        }
    }

    fn ids(letters: &[&Letter]) -> Vec<String> {
        letters.iter().map(|l| l.id.to_string()).collect()
    }

    fn sample() -> Vec<Letter> {
        let mut fav = letter("c", "Friday", "2025-10-03", "a small smile");
        fav.favorite = true;
        let mut gone = letter("d", "Friday again", "2025-10-10", "trash me");
        gone.deleted = true;
        vec![
            letter("a", "Monday", "2025-09-29", "rain all day"),
            letter("b", "Note", "2025-10-01", "Smile back"),
            fav,
            gone,
        ]
    }

    #[test]
    fn empty_query_shows_everything_not_trashed() {
        let letters = sample();
        let shown = visible(&letters, &LetterFilter::default());
        assert_eq!(ids(&shown), vec!["a", "b", "c"]);
    }

    #[test]
    fn query_is_trimmed_and_case_insensitive_over_title_date_body() {
        let letters = sample();
        assert_eq!(
            ids(&visible(&letters, &LetterFilter::new("  SMILE ", false))),
            vec!["b", "c"]
        );
        assert_eq!(
            ids(&visible(&letters, &LetterFilter::new("2025-10", false))),
            vec!["b", "c"]
        );
        assert_eq!(
            ids(&visible(&letters, &LetterFilter::new("friday", false))),
            vec!["c"],
            "trashed letters stay hidden even when they match"
        );
    }

    #[test]
    fn favorites_only_combines_with_query() {
        let letters = sample();
        assert_eq!(
            ids(&visible(&letters, &LetterFilter::new("", true))),
            vec!["c"]
        );
        assert!(visible(&letters, &LetterFilter::new("rain", true)).is_empty());
    }

    #[test]
    fn missing_text_counts_as_empty() {
        let blank: Letter = serde_json::from_str(r#"{"id":"z"}"#).unwrap();
        let letters = vec![blank];
        assert_eq!(visible(&letters, &LetterFilter::default()).len(), 1);
        assert!(visible(&letters, &LetterFilter::new("x", false)).is_empty());
    }

    #[test]
    fn board_and_trash_partition_the_snapshot() {
        let letters = sample();
        let board = visible(&letters, &LetterFilter::default());
        let trash = trashed(&letters, "");
        assert_eq!(ids(&trash), vec!["d"]);
        for letter in &letters {
            let on_board = board.iter().any(|l| l.id == letter.id);
            let in_trash = trash.iter().any(|l| l.id == letter.id);
            assert!(on_board ^ in_trash, "{} must be in exactly one view", letter.id);
        }
    }

    #[test]
    fn filter_never_reorders() {
        let mut letters = sample();
        letters.reverse();
        assert_eq!(
            ids(&visible(&letters, &LetterFilter::default())),
            vec!["c", "b", "a"]
        );
    }
}
