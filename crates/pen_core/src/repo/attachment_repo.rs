//! Attachment repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist image/file rows with their raw payload bytes.
//! - Provide note-scoped and vault-wide listings.
//!
//! # Invariants
//! - Surrogate ids come from SQLite `AUTOINCREMENT` and are never reused.
//! - Payload bytes are stored unmodified.
//! - Lists are ordered by `created_at ASC, id ASC`.

use crate::model::attachment::{Attachment, AttachmentId, AttachmentKind};
use crate::model::from_millis;
use crate::repo::{RepoError, RepoResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Row to insert; the surrogate id is assigned by storage.
#[derive(Debug, Clone, Copy)]
pub struct NewAttachment<'a> {
    pub note_id: &'a str,
    pub name: &'a str,
    pub mime_type: Option<&'a str>,
    pub data: &'a [u8],
    pub created_at: DateTime<Utc>,
}

/// Repository interface for one attachment kind.
pub trait AttachmentRepository {
    fn kind(&self) -> AttachmentKind;
    /// Inserts one attachment and returns its fresh surrogate id.
    fn insert_attachment(&self, new: &NewAttachment<'_>) -> RepoResult<AttachmentId>;
    fn get_attachment(&self, id: AttachmentId) -> RepoResult<Option<Attachment>>;
    /// Like `get_attachment`, but only when `note_id` owns the row.
    fn get_owned_attachment(
        &self,
        note_id: &str,
        id: AttachmentId,
    ) -> RepoResult<Option<Attachment>>;
    fn list_for_note(&self, note_id: &str) -> RepoResult<Vec<Attachment>>;
    fn list_all(&self) -> RepoResult<Vec<Attachment>>;
    /// Finds the attachment matching the merge duplicate key.
    fn find_by_note_and_name(&self, note_id: &str, name: &str)
        -> RepoResult<Option<AttachmentId>>;
    /// Returns `false` when no row matched.
    fn delete_attachment(&self, id: AttachmentId) -> RepoResult<bool>;
    /// Deletes every attachment owned by `note_id`; returns removed row count.
    fn delete_for_note(&self, note_id: &str) -> RepoResult<usize>;
}

/// SQLite-backed attachment repository bound to one kind/table.
pub struct SqliteAttachmentRepository<'conn> {
    conn: &'conn Connection,
    kind: AttachmentKind,
}

impl<'conn> SqliteAttachmentRepository<'conn> {
    pub fn new(conn: &'conn Connection, kind: AttachmentKind) -> Self {
        Self { conn, kind }
    }

    pub fn images(conn: &'conn Connection) -> Self {
        Self::new(conn, AttachmentKind::Image)
    }

    pub fn files(conn: &'conn Connection) -> Self {
        Self::new(conn, AttachmentKind::File)
    }

    fn select_sql(&self) -> String {
        let mime_column = match self.kind {
            AttachmentKind::Image => "NULL AS mime_type",
            AttachmentKind::File => "mime_type",
        };
        format!(
            "SELECT id, note_id, name, {mime_column}, data, created_at FROM {}",
            self.kind.table()
        )
    }

    fn query_list(&self, sql: &str, params: impl rusqlite::Params) -> RepoResult<Vec<Attachment>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut attachments = Vec::new();
        while let Some(row) = rows.next()? {
            attachments.push(parse_attachment_row(self.kind, row)?);
        }
        Ok(attachments)
    }
}

impl AttachmentRepository for SqliteAttachmentRepository<'_> {
    fn kind(&self) -> AttachmentKind {
        self.kind
    }

    fn insert_attachment(&self, new: &NewAttachment<'_>) -> RepoResult<AttachmentId> {
        match self.kind {
            AttachmentKind::Image => self.conn.execute(
                "INSERT INTO images (note_id, name, data, created_at)
                 VALUES (?1, ?2, ?3, ?4);",
                params![
                    new.note_id,
                    new.name,
                    new.data,
                    new.created_at.timestamp_millis()
                ],
            )?,
            AttachmentKind::File => self.conn.execute(
                "INSERT INTO files (note_id, name, mime_type, data, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    new.note_id,
                    new.name,
                    new.mime_type.unwrap_or_default(),
                    new.data,
                    new.created_at.timestamp_millis()
                ],
            )?,
        };
        Ok(self.conn.last_insert_rowid())
    }

    fn get_attachment(&self, id: AttachmentId) -> RepoResult<Option<Attachment>> {
        let sql = format!("{} WHERE id = ?1;", self.select_sql());
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_attachment_row(self.kind, row)?));
        }
        Ok(None)
    }

    fn get_owned_attachment(
        &self,
        note_id: &str,
        id: AttachmentId,
    ) -> RepoResult<Option<Attachment>> {
        let sql = format!("{} WHERE id = ?1 AND note_id = ?2;", self.select_sql());
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![id, note_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_attachment_row(self.kind, row)?));
        }
        Ok(None)
    }

    fn list_for_note(&self, note_id: &str) -> RepoResult<Vec<Attachment>> {
        let sql = format!(
            "{} WHERE note_id = ?1 ORDER BY created_at ASC, id ASC;",
            self.select_sql()
        );
        self.query_list(&sql, [note_id])
    }

    fn list_all(&self) -> RepoResult<Vec<Attachment>> {
        let sql = format!("{} ORDER BY created_at ASC, id ASC;", self.select_sql());
        self.query_list(&sql, [])
    }

    fn find_by_note_and_name(
        &self,
        note_id: &str,
        name: &str,
    ) -> RepoResult<Option<AttachmentId>> {
        let sql = format!(
            "SELECT id FROM {} WHERE note_id = ?1 AND name = ?2 ORDER BY id ASC LIMIT 1;",
            self.kind.table()
        );
        let id = self
            .conn
            .query_row(&sql, params![note_id, name], |row| row.get(0))
            .optional()?;
        Ok(id)
    }

    fn delete_attachment(&self, id: AttachmentId) -> RepoResult<bool> {
        let sql = format!("DELETE FROM {} WHERE id = ?1;", self.kind.table());
        let changed = self.conn.execute(&sql, [id])?;
        Ok(changed > 0)
    }

    fn delete_for_note(&self, note_id: &str) -> RepoResult<usize> {
        let sql = format!("DELETE FROM {} WHERE note_id = ?1;", self.kind.table());
        Ok(self.conn.execute(&sql, [note_id])?)
    }
}

fn parse_attachment_row(kind: AttachmentKind, row: &Row<'_>) -> RepoResult<Attachment> {
    let id: AttachmentId = row.get("id")?;
    let mime_type: Option<String> = row.get("mime_type")?;
    if kind == AttachmentKind::File && mime_type.is_none() {
        return Err(RepoError::InvalidData(format!(
            "file attachment {id} has no mime_type"
        )));
    }

    Ok(Attachment {
        id,
        kind,
        note_id: row.get("note_id")?,
        name: row.get("name")?,
        mime_type,
        data: row.get("data")?,
        created_at: from_millis(row.get("created_at")?),
    })
}
