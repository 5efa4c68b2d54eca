//! Vault domain model: notes and the attachments they own.
//!
//! # Responsibility
//! - Define canonical data structures used by store, bundle and merge code.
//! - Keep timestamp precision aligned with persisted storage.
//!
//! # Invariants
//! - Every note is identified by a stable `NoteId`, never reused.
//! - Every attachment belongs to exactly one note.

pub mod attachment;
pub mod note;

use chrono::{DateTime, Utc};

/// Returns the current time truncated to millisecond precision.
///
/// Storage keeps epoch milliseconds, so anything finer would not survive a
/// write/read cycle.
pub fn now_millis() -> DateTime<Utc> {
    from_millis(Utc::now().timestamp_millis())
}

/// Converts epoch milliseconds to a UTC timestamp.
///
/// Out-of-range values clamp to the Unix epoch.
pub fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

/// Truncates a timestamp to millisecond precision.
pub fn truncate_millis(value: DateTime<Utc>) -> DateTime<Utc> {
    from_millis(value.timestamp_millis())
}
