//! Attachment domain model (images and files).
//!
//! # Invariants
//! - `id` is a store-local surrogate, unique within its kind only.
//! - `note_id` references an existing note; attachments have no independent
//!   lifecycle.
//! - Attachments are never updated in place.

use crate::model::note::NoteId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned surrogate id for attachments.
pub type AttachmentId = i64;

/// Attachment category. Both kinds share one record shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    File,
}

impl AttachmentKind {
    /// Backing table name.
    pub fn table(self) -> &'static str {
        match self {
            Self::Image => "images",
            Self::File => "files",
        }
    }

    /// Reference scheme used inside note content (`image:<id>`).
    pub fn scheme(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::File => "file",
        }
    }
}

/// Canonical attachment record with raw payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: AttachmentId,
    pub kind: AttachmentKind,
    pub note_id: NoteId,
    /// Display name, also half of the merge duplicate key.
    pub name: String,
    /// Declared mime type. Always `Some` for files; `None` for images, whose
    /// type is sniffed from the payload.
    pub mime_type: Option<String>,
    pub data: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

/// Caller input for `add_image` / `add_file`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPayload {
    pub name: String,
    pub mime_type: Option<String>,
    pub data: Vec<u8>,
}

impl AttachmentPayload {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            mime_type: None,
            data: data.into(),
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}
