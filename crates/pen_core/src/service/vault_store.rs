//! Vault store: CRUD over notes, images and files.
//!
//! # Responsibility
//! - Own the SQLite connection for one vault and expose the store contract.
//! - Allocate note ids and stamp timestamps.
//! - Keep the derived tag cache in step with note content.
//!
//! # Invariants
//! - Note ids are `n_<millis>`; ids issued by one store strictly increase and
//!   never collide with stored ids.
//! - `updated_at` never moves backwards for a note.
//! - `remove` deletes a note and all of its attachments in one transaction.
//! - `update` overwrites unconditionally (no timestamp comparison); only
//!   `merge` applies last-writer-wins.

use crate::db::{open_db, open_db_in_memory};
use crate::markdown::{extract_tags, normalize_tag, BlobRef};
use crate::model::attachment::{Attachment, AttachmentId, AttachmentKind, AttachmentPayload};
use crate::model::note::{note_id_from_millis, Note, NoteId, NotePatch};
use crate::model::now_millis;
use crate::repo::attachment_repo::{
    AttachmentRepository, NewAttachment, SqliteAttachmentRepository,
};
use crate::repo::note_repo::{
    max_note_id_millis, NoteListQuery, NoteRepository, SqliteNoteRepository,
};
use crate::service::{StoreError, StoreResult};
use chrono::Utc;
use log::{error, info};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;

/// Single-owner vault store.
///
/// Construct once and pass by reference; mutating calls take `&mut self`, so
/// there is exactly one writer at a time.
pub struct VaultStore {
    conn: Connection,
    last_issued_millis: i64,
}

impl VaultStore {
    /// Opens (or creates) a vault database file.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::from_connection(open_db(path)?)
    }

    /// Opens a throwaway in-memory vault.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(open_db_in_memory()?)
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(conn: Connection) -> StoreResult<Self> {
        let last_issued_millis = max_note_id_millis(&conn, id_ceiling_millis())?.unwrap_or(0);
        Ok(Self {
            conn,
            last_issued_millis,
        })
    }

    /// All notes, most recently updated first.
    pub fn list(&self) -> StoreResult<Vec<Note>> {
        Ok(self.notes().list_notes(&NoteListQuery::default())?)
    }

    pub fn get(&self, id: &str) -> StoreResult<Option<Note>> {
        Ok(self.notes().get_note(id)?)
    }

    /// Creates an empty note with a fresh id.
    pub fn create(&mut self) -> StoreResult<Note> {
        let id = self.next_note_id()?;
        let note = Note::empty(id, now_millis());

        self.in_transaction("create", |tx| {
            SqliteNoteRepository::new(tx).insert_note(&note)?;
            Ok(())
        })?;

        info!("event=note_create module=store status=ok note_id={}", note.id);
        Ok(note)
    }

    /// Merges the supplied fields, stamps `updated_at`, and persists the full
    /// record. Returns `Ok(None)` when `id` does not exist.
    pub fn update(&mut self, id: &str, patch: &NotePatch) -> StoreResult<Option<Note>> {
        let now = now_millis();
        let updated = self.in_transaction("update", |tx| {
            let notes = SqliteNoteRepository::new(tx);
            let Some(mut note) = notes.get_note(id)? else {
                return Ok(None);
            };

            patch.apply_to(&mut note);
            note.updated_at = now.max(note.updated_at);
            note.tags = extract_tags(&note.content);

            notes.replace_note(&note)?;
            notes.replace_tags(&note.id, &note.tags)?;
            Ok(Some(note))
        })?;

        match updated.as_ref() {
            Some(note) => info!(
                "event=note_update module=store status=ok note_id={} tags={}",
                note.id,
                note.tags.len()
            ),
            None => info!("event=note_update module=store status=not_found note_id={id}"),
        }
        Ok(updated)
    }

    /// Deletes a note and every attachment it owns, all or nothing.
    ///
    /// Returns `false` when the note did not exist.
    pub fn remove(&mut self, id: &str) -> StoreResult<bool> {
        let (existed, images, files) = self.in_transaction("remove", |tx| {
            let images = SqliteAttachmentRepository::images(tx).delete_for_note(id)?;
            let files = SqliteAttachmentRepository::files(tx).delete_for_note(id)?;
            let notes = SqliteNoteRepository::new(tx);
            notes.replace_tags(id, &[])?;
            let existed = notes.delete_note(id)?;
            Ok((existed, images, files))
        })?;

        info!(
            "event=note_remove module=store status={} note_id={id} images={images} files={files}",
            if existed { "ok" } else { "not_found" }
        );
        Ok(existed)
    }

    /// Attaches an image to an existing note. The payload is stored as-is.
    pub fn add_image(
        &mut self,
        note_id: &str,
        payload: AttachmentPayload,
    ) -> StoreResult<Attachment> {
        self.add_attachment(AttachmentKind::Image, note_id, payload)
    }

    /// Attaches a file to an existing note. Missing mime types are stored as
    /// `application/octet-stream`.
    pub fn add_file(&mut self, note_id: &str, payload: AttachmentPayload) -> StoreResult<Attachment> {
        self.add_attachment(AttachmentKind::File, note_id, payload)
    }

    pub fn list_images(&self, note_id: &str) -> StoreResult<Vec<Attachment>> {
        Ok(SqliteAttachmentRepository::images(&self.conn).list_for_note(note_id)?)
    }

    pub fn list_files(&self, note_id: &str) -> StoreResult<Vec<Attachment>> {
        Ok(SqliteAttachmentRepository::files(&self.conn).list_for_note(note_id)?)
    }

    pub fn list_all_images(&self) -> StoreResult<Vec<Attachment>> {
        Ok(SqliteAttachmentRepository::images(&self.conn).list_all()?)
    }

    pub fn list_all_files(&self) -> StoreResult<Vec<Attachment>> {
        Ok(SqliteAttachmentRepository::files(&self.conn).list_all()?)
    }

    /// Deletes one image. Text references to it are left dangling.
    pub fn remove_image(&mut self, id: AttachmentId) -> StoreResult<bool> {
        self.remove_attachment(AttachmentKind::Image, id)
    }

    /// Deletes one file. Text references to it are left dangling.
    pub fn remove_file(&mut self, id: AttachmentId) -> StoreResult<bool> {
        self.remove_attachment(AttachmentKind::File, id)
    }

    /// Resolves an `image:<id>` / `file:<id>` reference for display.
    ///
    /// Looks in `note_id`'s own attachments first, then vault-wide. `None`
    /// means unresolved.
    pub fn resolve_reference(
        &self,
        note_id: &str,
        reference: &str,
    ) -> StoreResult<Option<Attachment>> {
        let Some(blob_ref) = BlobRef::parse(reference) else {
            return Ok(None);
        };
        let repo = SqliteAttachmentRepository::new(&self.conn, blob_ref.kind);

        if let Some(owned) = repo.get_owned_attachment(note_id, blob_ref.id)? {
            return Ok(Some(owned));
        }
        Ok(repo.get_attachment(blob_ref.id)?)
    }

    /// Filters notes by `#tag` or by case-insensitive text match over title
    /// and content. A blank query lists everything.
    pub fn search(&self, query: &str) -> StoreResult<Vec<Note>> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return self.list();
        }

        if trimmed.starts_with('#') {
            let Some(tag) = normalize_tag(trimmed) else {
                return self.list();
            };
            let query = NoteListQuery { tag: Some(tag) };
            return Ok(self.notes().list_notes(&query)?);
        }

        let needle = trimmed.to_lowercase();
        Ok(self
            .list()?
            .into_iter()
            .filter(|note| {
                format!("{} {}", note.title, note.content)
                    .to_lowercase()
                    .contains(&needle)
            })
            .collect())
    }

    /// All cached tags across the vault.
    pub fn list_tags(&self) -> StoreResult<Vec<String>> {
        Ok(self.notes().list_tags()?)
    }

    pub(crate) fn notes(&self) -> SqliteNoteRepository<'_> {
        SqliteNoteRepository::new(&self.conn)
    }

    /// Raises the id allocator past ids that entered through import.
    pub(crate) fn observe_note_ids(&mut self) -> StoreResult<()> {
        if let Some(max) = max_note_id_millis(&self.conn, id_ceiling_millis())? {
            self.last_issued_millis = self.last_issued_millis.max(max);
        }
        Ok(())
    }

    /// Runs `work` inside one `IMMEDIATE` transaction.
    ///
    /// Repository failures roll back and surface as `TransactionFailure`;
    /// other store errors roll back and pass through unchanged.
    pub(crate) fn in_transaction<T>(
        &mut self,
        operation: &'static str,
        work: impl FnOnce(&Transaction<'_>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| transaction_failure(operation, err.into()))?;

        let value = match work(&tx) {
            Ok(value) => value,
            Err(StoreError::Repo(err)) => return Err(transaction_failure(operation, err)),
            Err(other) => return Err(other),
        };

        tx.commit()
            .map_err(|err| transaction_failure(operation, err.into()))?;
        Ok(value)
    }

    fn next_note_id(&mut self) -> StoreResult<NoteId> {
        let floor = self
            .last_issued_millis
            .checked_add(1)
            .ok_or(StoreError::IdSpaceExhausted)?;
        let mut millis = Utc::now().timestamp_millis().max(floor);
        let notes = SqliteNoteRepository::new(&self.conn);
        while notes.note_exists(&note_id_from_millis(millis))? {
            millis = millis.checked_add(1).ok_or(StoreError::IdSpaceExhausted)?;
        }
        self.last_issued_millis = millis;
        Ok(note_id_from_millis(millis))
    }

    fn add_attachment(
        &mut self,
        kind: AttachmentKind,
        note_id: &str,
        payload: AttachmentPayload,
    ) -> StoreResult<Attachment> {
        let created_at = now_millis();
        let mime_type = match kind {
            AttachmentKind::Image => None,
            AttachmentKind::File => Some(
                payload
                    .mime_type
                    .filter(|mime| !mime.trim().is_empty())
                    .unwrap_or_else(|| crate::codec::FALLBACK_MIME.to_string()),
            ),
        };
        let name = payload.name;
        let data = payload.data;

        let id = self.in_transaction("add_attachment", |tx| {
            if !SqliteNoteRepository::new(tx).note_exists(note_id)? {
                return Err(StoreError::OrphanAttachment {
                    note_id: note_id.to_string(),
                    name: name.clone(),
                });
            }
            let repo = SqliteAttachmentRepository::new(tx, kind);
            let id = repo.insert_attachment(&NewAttachment {
                note_id,
                name: &name,
                mime_type: mime_type.as_deref(),
                data: &data,
                created_at,
            })?;
            Ok(id)
        });

        let id = match id {
            Ok(id) => id,
            Err(err) => {
                error!(
                    "event=attachment_add module=store status=error kind={kind:?} note_id={note_id} error={err}"
                );
                return Err(err);
            }
        };

        info!(
            "event=attachment_add module=store status=ok kind={kind:?} note_id={note_id} attachment_id={id} bytes={}",
            data.len()
        );
        Ok(Attachment {
            id,
            kind,
            note_id: note_id.to_string(),
            name,
            mime_type,
            data,
            created_at,
        })
    }

    fn remove_attachment(&mut self, kind: AttachmentKind, id: AttachmentId) -> StoreResult<bool> {
        let removed = SqliteAttachmentRepository::new(&self.conn, kind).delete_attachment(id)?;
        info!(
            "event=attachment_remove module=store status={} kind={kind:?} attachment_id={id}",
            if removed { "ok" } else { "not_found" }
        );
        Ok(removed)
    }
}

/// Imported ids further ahead of the clock than this do not move the allocator.
const MAX_ID_LEAD_MILLIS: i64 = 24 * 60 * 60 * 1000;

fn id_ceiling_millis() -> i64 {
    Utc::now().timestamp_millis().saturating_add(MAX_ID_LEAD_MILLIS)
}

fn transaction_failure(operation: &'static str, source: crate::repo::RepoError) -> StoreError {
    error!("event=transaction module=store status=error operation={operation} error={source}");
    StoreError::TransactionFailure { operation, source }
}
