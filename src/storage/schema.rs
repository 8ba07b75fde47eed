use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn apply(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS letters (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL DEFAULT 'letter',
            title TEXT NOT NULL,
            date TEXT NOT NULL DEFAULT '',
            body TEXT NOT NULL DEFAULT '',
            favorite INTEGER NOT NULL DEFAULT 0,
            deleted INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS letters_by_created
            ON letters(created_at DESC);

        -- no foreign key: comment cleanup is an explicit operation
        CREATE TABLE IF NOT EXISTS comments (
            id TEXT PRIMARY KEY,
            letter_id TEXT NOT NULL,
            author TEXT NOT NULL DEFAULT '',
            text TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS comments_by_letter
            ON comments(letter_id, created_at ASC);
        "#,
    )
    .context("applying schema migrations")?;
    Ok(())
}
