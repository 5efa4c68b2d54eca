//! Note/tag repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist full note records keyed by their stable string id.
//! - Own tag-cache replacement for one note.
//!
//! # Invariants
//! - Note lists are sorted by `updated_at DESC, id ASC`.
//! - `replace_tags` rewrites the whole cached tag set; callers run it inside
//!   the same transaction as the note write.
//! - Tag names are lower-cased before persistence.

use crate::model::from_millis;
use crate::model::note::{note_id_millis, Note, NoteId};
use crate::repo::{RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const NOTE_SELECT_SQL: &str = "SELECT
    id,
    title,
    content,
    created_at,
    updated_at
FROM notes";

/// Query options for note list use-cases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteListQuery {
    /// Optional single-tag exact match filter (case-insensitive).
    pub tag: Option<String>,
}

/// Repository interface for note persistence.
pub trait NoteRepository {
    /// Inserts one new note. Fails on duplicate id.
    fn insert_note(&self, note: &Note) -> RepoResult<()>;
    /// Overwrites the full record of an existing note.
    ///
    /// Returns `false` when no row matched.
    fn replace_note(&self, note: &Note) -> RepoResult<bool>;
    fn get_note(&self, id: &str) -> RepoResult<Option<Note>>;
    fn note_exists(&self, id: &str) -> RepoResult<bool>;
    fn list_notes(&self, query: &NoteListQuery) -> RepoResult<Vec<Note>>;
    /// Deletes one note row. Returns `false` when no row matched.
    fn delete_note(&self, id: &str) -> RepoResult<bool>;
    /// Replaces all cached tags of one note.
    fn replace_tags(&self, id: &str, tags: &[String]) -> RepoResult<()>;
    /// Returns all cached tags sorted by name.
    fn list_tags(&self) -> RepoResult<Vec<String>>;
}

/// SQLite-backed note repository.
pub struct SqliteNoteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNoteRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn insert_note(&self, note: &Note) -> RepoResult<()> {
        note.validate()?;

        self.conn.execute(
            "INSERT INTO notes (id, title, content, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                note.id.as_str(),
                note.title.as_str(),
                note.content.as_str(),
                note.created_at.timestamp_millis(),
                note.updated_at.timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    fn replace_note(&self, note: &Note) -> RepoResult<bool> {
        note.validate()?;

        let changed = self.conn.execute(
            "UPDATE notes
             SET
                title = ?2,
                content = ?3,
                created_at = ?4,
                updated_at = ?5
             WHERE id = ?1;",
            params![
                note.id.as_str(),
                note.title.as_str(),
                note.content.as_str(),
                note.created_at.timestamp_millis(),
                note.updated_at.timestamp_millis(),
            ],
        )?;
        Ok(changed > 0)
    }

    fn get_note(&self, id: &str) -> RepoResult<Option<Note>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NOTE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_note_row(self.conn, row)?));
        }
        Ok(None)
    }

    fn note_exists(&self, id: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM notes WHERE id = ?1);",
            [id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn list_notes(&self, query: &NoteListQuery) -> RepoResult<Vec<Note>> {
        let mut sql = format!("{NOTE_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(tag) = query.tag.as_ref() {
            sql.push_str(
                " AND EXISTS (
                    SELECT 1
                    FROM note_tags nt
                    INNER JOIN tags t ON t.id = nt.tag_id
                    WHERE nt.note_id = notes.id
                      AND t.name = ? COLLATE NOCASE
                )",
            );
            bind_values.push(Value::Text(tag.clone()));
        }

        sql.push_str(" ORDER BY updated_at DESC, id ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(self.conn, row)?);
        }
        Ok(notes)
    }

    fn delete_note(&self, id: &str) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM notes WHERE id = ?1;", [id])?;
        Ok(changed > 0)
    }

    fn replace_tags(&self, id: &str, tags: &[String]) -> RepoResult<()> {
        self.conn
            .execute("DELETE FROM note_tags WHERE note_id = ?1;", [id])?;

        for tag in tags {
            let tag = tag.to_lowercase();
            self.conn.execute(
                "INSERT OR IGNORE INTO tags (name) VALUES (?1);",
                [tag.as_str()],
            )?;
            self.conn.execute(
                "INSERT OR IGNORE INTO note_tags (note_id, tag_id)
                 SELECT ?1, id
                 FROM tags
                 WHERE name = ?2 COLLATE NOCASE;",
                params![id, tag.as_str()],
            )?;
        }

        self.conn.execute(
            "DELETE FROM tags
             WHERE NOT EXISTS (SELECT 1 FROM note_tags nt WHERE nt.tag_id = tags.id);",
            [],
        )?;
        Ok(())
    }

    fn list_tags(&self) -> RepoResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM tags ORDER BY name COLLATE NOCASE ASC;")?;
        let mut rows = stmt.query([])?;
        let mut tags = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get("name")?;
            tags.push(value.to_lowercase());
        }
        Ok(tags)
    }
}

/// Returns the highest `n_<millis>` value at or below `ceiling`, if any.
pub fn max_note_id_millis(conn: &Connection, ceiling: i64) -> RepoResult<Option<i64>> {
    let mut stmt = conn.prepare("SELECT id FROM notes WHERE id LIKE 'n\\_%' ESCAPE '\\';")?;
    let mut rows = stmt.query([])?;
    let mut max = None;
    while let Some(row) = rows.next()? {
        let id: NoteId = row.get(0)?;
        if let Some(millis) = note_id_millis(&id).filter(|millis| *millis <= ceiling) {
            max = Some(max.map_or(millis, |current: i64| current.max(millis)));
        }
    }
    Ok(max)
}

fn parse_note_row(conn: &Connection, row: &Row<'_>) -> RepoResult<Note> {
    let id: NoteId = row.get("id")?;
    let created_at: i64 = row.get("created_at")?;
    let updated_at: i64 = row.get("updated_at")?;
    if updated_at < created_at {
        return Err(RepoError::InvalidData(format!(
            "note `{id}` has updated_at {updated_at} before created_at {created_at}"
        )));
    }
    let tags = load_tags_for_note(conn, id.as_str())?;

    Ok(Note {
        title: row.get("title")?,
        content: row.get("content")?,
        created_at: from_millis(created_at),
        updated_at: from_millis(updated_at),
        tags,
        id,
    })
}

fn load_tags_for_note(conn: &Connection, note_id: &str) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT t.name
         FROM note_tags nt
         INNER JOIN tags t ON t.id = nt.tag_id
         WHERE nt.note_id = ?1
         ORDER BY t.name COLLATE NOCASE ASC;",
    )?;
    let mut rows = stmt.query([note_id])?;
    let mut tags = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        tags.push(value.to_lowercase());
    }
    Ok(tags)
}
