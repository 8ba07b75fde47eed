use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{next_created_at, schema, Listeners, RecordStore, SnapshotSink, StoreResult, SubscriptionId};
use crate::config::StorageOptions;
use crate::error::StoreError;
use crate::model::{Comment, Letter, LetterPatch, NewComment, NewLetter, RecordId};

const LETTER_COLUMNS: &str = "id, kind, title, date, body, favorite, deleted, created_at";
const COMMENT_COLUMNS: &str = "id, letter_id, author, text, created_at";

#[derive(Clone)]
pub struct SqliteStore {
    db_path: Arc<PathBuf>,
    options: Arc<StorageOptions>,
    listeners: Arc<Mutex<Listeners>>,
}

impl SqliteStore {
    fn connect(&self) -> StoreResult<Connection> {
        let conn = Connection::open(&*self.db_path)?;
        prepare_connection(&conn, &self.options)?;
        Ok(conn)
    }

    fn with_connection<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T>,
    {
        let conn = self.connect()?;
        f(&conn)
    }

    pub fn database_path(&self) -> &Path {
        &self.db_path
    }

    pub fn live_subscriptions(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn fetch_letters(&self) -> StoreResult<Vec<Letter>> {
        self.with_connection(query_letters)
    }

    pub fn fetch_comments(&self, letter_id: &RecordId) -> StoreResult<Vec<Comment>> {
        self.with_connection(|conn| query_comments(conn, letter_id))
    }

    fn publish_letters(&self) {
        if !self.listeners.lock().has_letter_listeners() {
            return;
        }
        let snapshot = self.fetch_letters();
        let mut listeners = self.listeners.lock();
        match snapshot {
            Ok(letters) => listeners.broadcast_letters(&letters),
            Err(err) => {
                tracing::warn!(?err, "letters query failed; dropping letter subscriptions");
                let ids = listeners.letter_subscriptions();
                listeners.fail(&ids, &err);
            }
        }
    }

    fn publish_comments(&self, letter_id: &RecordId) {
        if self.listeners.lock().comment_subscriptions(letter_id).is_empty() {
            return;
        }
        let snapshot = self.fetch_comments(letter_id);
        let mut listeners = self.listeners.lock();
        match snapshot {
            Ok(comments) => listeners.broadcast_comments(letter_id, &comments),
            Err(err) => {
                tracing::warn!(?err, letter_id = %letter_id, "comments query failed");
                let ids = listeners.comment_subscriptions(letter_id);
                listeners.fail(&ids, &err);
            }
        }
    }

    fn comment_parent(conn: &Connection, id: &RecordId) -> StoreResult<RecordId> {
        let parent: Option<String> = conn
            .query_row(
                "SELECT letter_id FROM comments WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        parent.map(RecordId::from).ok_or_else(|| StoreError::NotFound {
            kind: "comment",
            id: id.clone(),
        })
    }
}

impl RecordStore for SqliteStore {
    fn subscribe_letters(&self, sink: SnapshotSink) -> StoreResult<SubscriptionId> {
        let letters = self.fetch_letters()?;
        let mut listeners = self.listeners.lock();
        let id = listeners.add_letters(sink);
        listeners.send_letters_to(id, &letters);
        tracing::debug!(subscription = id.get(), "letters subscription opened");
        Ok(id)
    }

    fn subscribe_comments(
        &self,
        letter_id: &RecordId,
        sink: SnapshotSink,
    ) -> StoreResult<SubscriptionId> {
        let comments = self.fetch_comments(letter_id)?;
        let mut listeners = self.listeners.lock();
        let id = listeners.add_comments(letter_id.clone(), sink);
        listeners.send_comments_to(id, &comments);
        tracing::debug!(subscription = id.get(), letter_id = %letter_id, "comments subscription opened");
        Ok(id)
    }

    fn unsubscribe(&self, subscription: SubscriptionId) {
        if self.listeners.lock().remove(subscription) {
            tracing::debug!(subscription = subscription.get(), "subscription closed");
        }
    }

    fn create_letter(&self, letter: NewLetter) -> StoreResult<RecordId> {
        let id = RecordId::generate();
        self.with_connection(|conn| {
            let last: i64 = conn.query_row(
                "SELECT COALESCE(MAX(created_at), 0) FROM letters",
                [],
                |row| row.get(0),
            )?;
            conn.execute(
                "INSERT INTO letters (id, kind, title, date, body, favorite, deleted, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, ?6)",
                params![
                    id.as_str(),
                    letter.kind.as_ref(),
                    letter.title,
                    letter.date,
                    letter.body,
                    next_created_at(last)
                ],
            )?;
            Ok(())
        })?;
        self.publish_letters();
        Ok(id)
    }

    fn update_letter(&self, id: &RecordId, patch: &LetterPatch) -> StoreResult<()> {
        if patch.is_empty() {
            return Ok(());
        }
        self.with_connection(|conn| {
            let mut letter = query_letter(conn, id)?.ok_or_else(|| StoreError::NotFound {
                kind: "letter",
                id: id.clone(),
            })?;
            patch.apply(&mut letter);
            conn.execute(
                "UPDATE letters SET title = ?1, date = ?2, body = ?3, favorite = ?4, deleted = ?5
                 WHERE id = ?6",
                params![
                    letter.title,
                    letter.date,
                    letter.body,
                    letter.favorite,
                    letter.deleted,
                    id.as_str()
                ],
            )?;
            Ok(())
        })?;
        self.publish_letters();
        Ok(())
    }

    fn delete_letter(&self, id: &RecordId) -> StoreResult<()> {
        self.with_connection(|conn| {
            let removed = conn.execute("DELETE FROM letters WHERE id = ?1", params![id.as_str()])?;
            if removed == 0 {
                return Err(StoreError::NotFound {
                    kind: "letter",
                    id: id.clone(),
                });
            }
            Ok(())
        })?;
        self.publish_letters();
        Ok(())
    }

    fn create_comment(&self, comment: NewComment) -> StoreResult<RecordId> {
        let id = RecordId::generate();
        self.with_connection(|conn| {
            let last: i64 = conn.query_row(
                "SELECT COALESCE(MAX(created_at), 0) FROM comments",
                [],
                |row| row.get(0),
            )?;
            conn.execute(
                "INSERT INTO comments (id, letter_id, author, text, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id.as_str(),
                    comment.letter_id.as_str(),
                    comment.author,
                    comment.text,
                    next_created_at(last)
                ],
            )?;
            Ok(())
        })?;
        self.publish_comments(&comment.letter_id);
        Ok(id)
    }

    fn update_comment(&self, id: &RecordId, text: &str) -> StoreResult<()> {
        let parent = self.with_connection(|conn| {
            let parent = Self::comment_parent(conn, id)?;
            conn.execute(
                "UPDATE comments SET text = ?1 WHERE id = ?2",
                params![text, id.as_str()],
            )?;
            Ok(parent)
        })?;
        self.publish_comments(&parent);
        Ok(())
    }

    fn delete_comment(&self, id: &RecordId) -> StoreResult<()> {
        let parent = self.with_connection(|conn| {
            let parent = Self::comment_parent(conn, id)?;
            conn.execute("DELETE FROM comments WHERE id = ?1", params![id.as_str()])?;
            Ok(parent)
        })?;
        self.publish_comments(&parent);
        Ok(())
    }

    fn delete_comments_for(&self, letter_id: &RecordId) -> StoreResult<usize> {
        let removed = self.with_connection(|conn| {
            Ok(conn.execute(
                "DELETE FROM comments WHERE letter_id = ?1",
                params![letter_id.as_str()],
            )?)
        })?;
        self.publish_comments(letter_id);
        Ok(removed)
    }
}

pub fn init(storage: &StorageOptions) -> Result<SqliteStore> {
    let db_path = &storage.database_path;
    let existed = db_path.exists();
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let conn = Connection::open(db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    prepare_connection(&conn, storage).context("configuring sqlite connection")?;
    schema::apply(&conn)?;
    if !existed && storage.seed_on_first_run {
        seed_initial_letters(&conn)?;
    }
    Ok(SqliteStore {
        db_path: Arc::new(db_path.clone()),
        options: Arc::new(storage.clone()),
        listeners: Arc::new(Mutex::new(Listeners::default())),
    })
}

fn prepare_connection(conn: &Connection, storage: &StorageOptions) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(
        None,
        "wal_autocheckpoint",
        storage.wal_autocheckpoint.to_string(),
    )?;
    Ok(())
}

fn query_letters(conn: &Connection) -> StoreResult<Vec<Letter>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {LETTER_COLUMNS} FROM letters ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map([], letter_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn query_letter(conn: &Connection, id: &RecordId) -> StoreResult<Option<Letter>> {
    Ok(conn
        .query_row(
            &format!("SELECT {LETTER_COLUMNS} FROM letters WHERE id = ?1"),
            params![id.as_str()],
            letter_from_row,
        )
        .optional()?)
}

fn query_comments(conn: &Connection, letter_id: &RecordId) -> StoreResult<Vec<Comment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COMMENT_COLUMNS} FROM comments WHERE letter_id = ?1 ORDER BY created_at ASC"
    ))?;
    let rows = stmt.query_map(params![letter_id.as_str()], comment_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn letter_from_row(row: &Row<'_>) -> rusqlite::Result<Letter> {
    let kind_column = row.as_ref().column_index("kind")?;
    let kind: String = row.get(kind_column)?;
    let kind = kind.parse().map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(kind_column, Type::Text, Box::new(err))
    })?;
    Ok(Letter {
        id: RecordId::from(row.get::<_, String>("id")?),
        kind,
        title: row.get("title")?,
        date: row.get("date")?,
        body: row.get("body")?,
        favorite: row.get("favorite")?,
        deleted: row.get("deleted")?,
        created_at: row.get("created_at")?,
    })
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: RecordId::from(row.get::<_, String>("id")?),
        letter_id: RecordId::from(row.get::<_, String>("letter_id")?),
        author: row.get("author")?,
        text: row.get("text")?,
        created_at: row.get("created_at")?,
    })
}

fn seed_initial_letters(conn: &Connection) -> Result<()> {
    let existing: Option<String> = conn
        .query_row("SELECT id FROM letters LIMIT 1", [], |row| row.get(0))
        .optional()
        .context("checking for existing letters")?;
    if existing.is_some() {
        return Ok(());
    }

    tracing::info!("seeding first-run letters");
    let today = crate::model::today_utc();
    let letters = [
        (
            "welcome",
            "This board keeps your letters.\nWrite one with `letterboard new`, open it with `letterboard show`.",
        ),
        (
            "on comments",
            "Every letter carries its own little thread.\nReply with `letterboard comment`.",
        ),
    ];

    let mut last = 0;
    for (title, body) in letters {
        last = next_created_at(last);
        conn.execute(
            "INSERT INTO letters (id, kind, title, date, body, favorite, deleted, created_at)
             VALUES (?1, 'letter', ?2, ?3, ?4, 0, 0, ?5)",
            params![RecordId::generate().as_str(), title, today, body, last],
        )
        .context("inserting seed letter")?;
    }

    Ok(())
}
