//! Note domain model.
//!
//! # Responsibility
//! - Define the canonical note record and its partial-update shape.
//! - Validate timestamp ordering before persistence.
//!
//! # Invariants
//! - `id` is stable and never reused for another note.
//! - `updated_at >= created_at`.
//! - `tags` is a derived cache of `content`, never authoritative.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable identifier of a note (`n_<epoch-millis>`).
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type NoteId = String;

/// Prefix of every note id. Keeps note ids disjoint from numeric attachment ids.
pub const NOTE_ID_PREFIX: &str = "n_";

/// Builds the note id issued for `millis`.
pub fn note_id_from_millis(millis: i64) -> NoteId {
    format!("{NOTE_ID_PREFIX}{millis}")
}

/// Extracts the millisecond component of a store-issued note id.
///
/// Returns `None` for ids minted elsewhere (imported bundles may carry any
/// non-empty string).
pub fn note_id_millis(id: &str) -> Option<i64> {
    id.strip_prefix(NOTE_ID_PREFIX)?.parse().ok()
}

/// Canonical note record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    #[serde(default)]
    pub title: String,
    /// Markdown-like source with `image:<id>` / `file:<id>` references and
    /// `[[Title]]` wiki-links.
    #[serde(default)]
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Lower-cased tags extracted from `content`, sorted.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Note validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NoteValidationError {
    #[error("note id cannot be empty")]
    EmptyId,
    #[error("note `{0}` has updatedAt earlier than createdAt")]
    UpdatedBeforeCreated(NoteId),
}

impl Note {
    /// Creates an empty note stamped with `now` as both timestamps.
    pub fn empty(id: impl Into<NoteId>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            content: String::new(),
            created_at: now,
            updated_at: now,
            tags: Vec::new(),
        }
    }

    /// Validates identity and timestamp ordering.
    pub fn validate(&self) -> Result<(), NoteValidationError> {
        if self.id.trim().is_empty() {
            return Err(NoteValidationError::EmptyId);
        }
        if self.updated_at < self.created_at {
            return Err(NoteValidationError::UpdatedBeforeCreated(self.id.clone()));
        }
        Ok(())
    }
}

/// Partial update for `VaultStore::update`.
///
/// Only `Some` fields are merged; `updated_at` is always re-stamped by the
/// store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
}

impl NotePatch {
    pub fn title(value: impl Into<String>) -> Self {
        Self {
            title: Some(value.into()),
            content: None,
        }
    }

    pub fn content(value: impl Into<String>) -> Self {
        Self {
            title: None,
            content: Some(value.into()),
        }
    }

    /// Applies supplied fields onto `note` in place.
    pub fn apply_to(&self, note: &mut Note) {
        if let Some(title) = self.title.as_ref() {
            note.title = title.clone();
        }
        if let Some(content) = self.content.as_ref() {
            note.content = content.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{note_id_from_millis, note_id_millis, Note, NotePatch, NoteValidationError};
    use crate::model::from_millis;

    #[test]
    fn validate_rejects_updated_before_created() {
        let mut note = Note::empty("n_1", from_millis(2_000));
        note.updated_at = from_millis(1_000);
        assert_eq!(
            note.validate(),
            Err(NoteValidationError::UpdatedBeforeCreated("n_1".to_string()))
        );
    }

    #[test]
    fn note_id_millis_reads_back_issued_ids_only() {
        assert_eq!(
            note_id_millis(&note_id_from_millis(1_700_000_000_123)),
            Some(1_700_000_000_123)
        );
        assert_eq!(note_id_millis("imported-note"), None);
        assert_eq!(note_id_millis("n_abc"), None);
    }

    #[test]
    fn patch_only_touches_supplied_fields() {
        let mut note = Note::empty("n_1", from_millis(0));
        note.title = "keep".to_string();
        NotePatch::content("body").apply_to(&mut note);
        assert_eq!(note.title, "keep");
        assert_eq!(note.content, "body");
    }
}
