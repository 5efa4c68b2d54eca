//! Plain export bundle: notes plus text-encoded attachments.
//!
//! # Responsibility
//! - Convert store records into the self-contained export document and back.
//! - Validate incoming documents against an explicit schema.
//!
//! # Invariants
//! - Missing (or `null`) `notes`/`images`/`files` arrays read as empty.
//! - `deserialize(serialize(..))` preserves every field and payload byte.
//! - Attachment ids in a bundle are informational; they are never reused by
//!   the importing store.

use crate::codec::{self, CodecError};
use crate::model::attachment::{Attachment, AttachmentId, AttachmentKind};
use crate::model::note::{Note, NoteId, NoteValidationError};
use crate::model::truncate_millis;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Mime type of the plain export document.
pub const BUNDLE_MIME: &str = "application/json";

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("malformed bundle document: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("invalid note in bundle: {0}")]
    InvalidNote(#[from] NoteValidationError),
    #[error("invalid {kind:?} payload `{name}` for note `{note_id}`: {source}")]
    InvalidPayload {
        kind: AttachmentKind,
        note_id: NoteId,
        name: String,
        #[source]
        source: CodecError,
    },
}

/// Serialized export unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub notes: Vec<Note>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub images: Vec<BundleImage>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub files: Vec<BundleFile>,
}

/// Image entry with its payload as a data url.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleImage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<AttachmentId>,
    pub note_id: NoteId,
    pub name: String,
    pub data: String,
    pub created_at: DateTime<Utc>,
}

/// File entry with its payload as a data url.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<AttachmentId>,
    pub note_id: NoteId,
    pub name: String,
    #[serde(rename = "type", default)]
    pub mime_type: String,
    pub data: String,
    pub created_at: DateTime<Utc>,
}

/// Bundle content with binary payloads restored.
///
/// Attachment `id`s carry the source store's value (or `0` when the bundle
/// omitted it).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedBundle {
    pub notes: Vec<Note>,
    pub images: Vec<Attachment>,
    pub files: Vec<Attachment>,
}

impl Bundle {
    /// Pretty-printed JSON document.
    pub fn to_json(&self) -> Result<String, BundleError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses and validates a JSON document.
    pub fn from_json(json: &str) -> Result<Self, BundleError> {
        let bundle: Self = serde_json::from_str(json)?;
        bundle.validate()?;
        Ok(bundle)
    }

    /// Validates note identity and timestamp ordering.
    pub fn validate(&self) -> Result<(), BundleError> {
        for note in &self.notes {
            note.validate()?;
        }
        Ok(())
    }

    pub fn decode(&self) -> Result<DecodedBundle, BundleError> {
        deserialize(self)
    }
}

/// Builds a bundle, encoding every attachment payload as a data url.
pub fn serialize(notes: &[Note], images: &[Attachment], files: &[Attachment]) -> Bundle {
    Bundle {
        notes: notes.to_vec(),
        images: images.iter().map(encode_image).collect(),
        files: files.iter().map(encode_file).collect(),
    }
}

/// Restores binary payloads and validates every note.
pub fn deserialize(bundle: &Bundle) -> Result<DecodedBundle, BundleError> {
    bundle.validate()?;

    let notes = bundle
        .notes
        .iter()
        .cloned()
        .map(|mut note| {
            note.created_at = truncate_millis(note.created_at);
            note.updated_at = truncate_millis(note.updated_at);
            note
        })
        .collect();

    let images = bundle
        .images
        .iter()
        .map(|image| {
            let decoded = decode_payload(
                AttachmentKind::Image,
                &image.note_id,
                &image.name,
                &image.data,
            )?;
            Ok(Attachment {
                id: image.id.unwrap_or_default(),
                kind: AttachmentKind::Image,
                note_id: image.note_id.clone(),
                name: image.name.clone(),
                mime_type: None,
                data: decoded.data,
                created_at: truncate_millis(image.created_at),
            })
        })
        .collect::<Result<Vec<_>, BundleError>>()?;

    let files = bundle
        .files
        .iter()
        .map(|file| {
            let decoded =
                decode_payload(AttachmentKind::File, &file.note_id, &file.name, &file.data)?;
            let mime_type = Some(file.mime_type.trim())
                .filter(|value| !value.is_empty())
                .map(str::to_string)
                .or(decoded.mime_type)
                .unwrap_or_else(|| codec::FALLBACK_MIME.to_string());
            Ok(Attachment {
                id: file.id.unwrap_or_default(),
                kind: AttachmentKind::File,
                note_id: file.note_id.clone(),
                name: file.name.clone(),
                mime_type: Some(mime_type),
                data: decoded.data,
                created_at: truncate_millis(file.created_at),
            })
        })
        .collect::<Result<Vec<_>, BundleError>>()?;

    Ok(DecodedBundle {
        notes,
        images,
        files,
    })
}

fn encode_image(image: &Attachment) -> BundleImage {
    let mime = image
        .mime_type
        .as_deref()
        .unwrap_or_else(|| codec::sniff_image_mime(&image.data));
    BundleImage {
        id: Some(image.id),
        note_id: image.note_id.clone(),
        name: image.name.clone(),
        data: codec::encode_data_url(mime, &image.data),
        created_at: image.created_at,
    }
}

fn encode_file(file: &Attachment) -> BundleFile {
    let mime = file.mime_type.clone().unwrap_or_default();
    BundleFile {
        id: Some(file.id),
        note_id: file.note_id.clone(),
        name: file.name.clone(),
        data: codec::encode_data_url(&mime, &file.data),
        mime_type: mime,
        created_at: file.created_at,
    }
}

fn decode_payload(
    kind: AttachmentKind,
    note_id: &str,
    name: &str,
    data: &str,
) -> Result<codec::DecodedBlob, BundleError> {
    codec::decode_data_url(data).map_err(|source| BundleError::InvalidPayload {
        kind,
        note_id: note_id.to_string(),
        name: name.to_string(),
        source,
    })
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
