//! Import reconciliation of a decoded bundle against an existing store.
//!
//! # Responsibility
//! - Apply last-writer-wins by `updated_at` to incoming notes.
//! - Insert incoming attachments unless their `(note_id, name)` already exists.
//!
//! # Invariants
//! - Additive only: nothing absent from the bundle is deleted.
//! - A stored note is never replaced by an equal-or-older incoming copy.
//! - Incoming attachment ids are never reused; storage assigns fresh ones.
//! - Callers run `merge` inside one transaction covering notes, images and
//!   files.

use crate::bundle::DecodedBundle;
use crate::markdown::extract_tags;
use crate::model::attachment::Attachment;
use crate::repo::attachment_repo::{
    AttachmentRepository, NewAttachment, SqliteAttachmentRepository,
};
use crate::repo::note_repo::{NoteRepository, SqliteNoteRepository};
use crate::repo::RepoResult;
use log::debug;
use rusqlite::Connection;

/// Per-entity outcome counts of one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub notes_inserted: usize,
    pub notes_replaced: usize,
    /// Incoming copy was not strictly newer.
    pub notes_kept: usize,
    pub images_inserted: usize,
    pub images_skipped: usize,
    pub files_inserted: usize,
    pub files_skipped: usize,
    /// Attachments whose owning note exists neither in the store nor in the
    /// bundle.
    pub orphans_skipped: usize,
}

impl MergeReport {
    /// Whether the merge wrote anything.
    pub fn changed(&self) -> bool {
        self.notes_inserted + self.notes_replaced + self.images_inserted + self.files_inserted > 0
    }
}

/// Reconciles `incoming` into the store behind `conn`.
///
/// `conn` is expected to be an open transaction; this function issues no
/// commit or rollback of its own.
pub fn merge(conn: &Connection, incoming: &DecodedBundle) -> RepoResult<MergeReport> {
    let notes = SqliteNoteRepository::new(conn);
    let images = SqliteAttachmentRepository::images(conn);
    let files = SqliteAttachmentRepository::files(conn);
    let mut report = MergeReport::default();

    for incoming_note in &incoming.notes {
        let mut note = incoming_note.clone();
        note.tags = extract_tags(&note.content);

        match notes.get_note(&note.id)? {
            Some(existing) if note.updated_at > existing.updated_at => {
                notes.replace_note(&note)?;
                notes.replace_tags(&note.id, &note.tags)?;
                report.notes_replaced += 1;
            }
            Some(_) => {
                debug!(
                    "event=merge_note module=merge status=kept note_id={}",
                    note.id
                );
                report.notes_kept += 1;
            }
            None => {
                notes.insert_note(&note)?;
                notes.replace_tags(&note.id, &note.tags)?;
                report.notes_inserted += 1;
            }
        }
    }

    let (inserted, skipped, orphans) = merge_attachments(&notes, &images, &incoming.images)?;
    report.images_inserted = inserted;
    report.images_skipped = skipped;
    report.orphans_skipped += orphans;

    let (inserted, skipped, orphans) = merge_attachments(&notes, &files, &incoming.files)?;
    report.files_inserted = inserted;
    report.files_skipped = skipped;
    report.orphans_skipped += orphans;

    Ok(report)
}

fn merge_attachments(
    notes: &impl NoteRepository,
    repo: &impl AttachmentRepository,
    incoming: &[Attachment],
) -> RepoResult<(usize, usize, usize)> {
    let (mut inserted, mut skipped, mut orphans) = (0, 0, 0);

    for attachment in incoming {
        if !notes.note_exists(&attachment.note_id)? {
            debug!(
                "event=merge_attachment module=merge status=orphan kind={:?} note_id={}",
                repo.kind(),
                attachment.note_id
            );
            orphans += 1;
            continue;
        }
        if repo
            .find_by_note_and_name(&attachment.note_id, &attachment.name)?
            .is_some()
        {
            skipped += 1;
            continue;
        }

        repo.insert_attachment(&NewAttachment {
            note_id: &attachment.note_id,
            name: &attachment.name,
            mime_type: attachment.mime_type.as_deref(),
            data: &attachment.data,
            created_at: attachment.created_at,
        })?;
        inserted += 1;
    }

    Ok((inserted, skipped, orphans))
}
