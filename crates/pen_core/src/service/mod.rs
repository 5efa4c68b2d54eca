//! Vault use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into the store contract used by UI callers.
//! - Own transaction boundaries for multi-entity writes.
//! - Drive the export/import pipelines through bundle, envelope and merge.

pub mod transfer;
pub mod vault_store;

use crate::bundle::BundleError;
use crate::db::DbError;
use crate::envelope::EnvelopeError;
use crate::model::note::NoteId;
use crate::repo::RepoError;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store-level error taxonomy.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("note not found: {0}")]
    NotFound(NoteId),
    #[error("no note id left to allocate")]
    IdSpaceExhausted,
    #[error("cannot attach `{name}`: note `{note_id}` does not exist")]
    OrphanAttachment { note_id: NoteId, name: String },
    /// A multi-entity write aborted; prior state is intact.
    #[error("`{operation}` aborted and was rolled back: {source}")]
    TransactionFailure {
        operation: &'static str,
        #[source]
        source: RepoError,
    },
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Bundle(#[from] BundleError),
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Repo(RepoError::Db(value))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}
