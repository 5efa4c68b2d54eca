//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from store orchestration.
//!
//! # Invariants
//! - Repositories borrow a `Connection`; a `Transaction` derefs to one, so the
//!   same repository code runs inside or outside a unit of work.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::model::note::NoteValidationError;
use thiserror::Error;

pub mod attachment_repo;
pub mod note_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for vault persistence and query operations.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Validation(#[from] NoteValidationError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("invalid persisted vault data: {0}")]
    InvalidData(String),
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
