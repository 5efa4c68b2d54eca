//! Core of the pen note vault.
//! Notes, attachments, the export bundle and the encrypted envelope all live
//! here; front ends only call into `VaultStore`.

pub mod bundle;
pub mod codec;
pub mod config;
pub mod db;
pub mod envelope;
pub mod logging;
pub mod markdown;
pub mod merge;
pub mod model;
pub mod repo;
pub mod service;

pub use bundle::{Bundle, BundleError, BundleFile, BundleImage, DecodedBundle};
pub use codec::CodecError;
pub use config::{ConfigError, VaultConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use envelope::{EnvelopeError, PenEnvelope, SealOptions};
pub use logging::{
    default_log_level, init_from_config, init_logging, logging_status, LoggingError,
};
pub use markdown::{extract_tags, render_wiki_links, BlobRef};
pub use merge::MergeReport;
pub use model::attachment::{Attachment, AttachmentId, AttachmentKind, AttachmentPayload};
pub use model::note::{Note, NoteId, NotePatch, NoteValidationError};
pub use repo::{RepoError, RepoResult};
pub use service::vault_store::VaultStore;
pub use service::{StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
