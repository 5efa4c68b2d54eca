//! Export/import pipelines over a `VaultStore`.
//!
//! Export: store -> bundle -> [envelope] -> text.
//! Import: text -> [envelope] -> bundle -> merge -> store.

use crate::bundle::{self, Bundle};
use crate::envelope::{self, PenEnvelope, SealOptions};
use crate::merge::{self, MergeReport};
use crate::service::vault_store::VaultStore;
use crate::service::{StoreError, StoreResult};
use log::info;
use std::time::Instant;

impl VaultStore {
    /// Bundles every note with every attachment in the vault.
    pub fn export_all(&self) -> StoreResult<Bundle> {
        let notes = self.list()?;
        let images = self.list_all_images()?;
        let files = self.list_all_files()?;
        let bundle = bundle::serialize(&notes, &images, &files);

        info!(
            "event=export module=transfer status=ok scope=all notes={} images={} files={}",
            bundle.notes.len(),
            bundle.images.len(),
            bundle.files.len()
        );
        Ok(bundle)
    }

    /// Bundles one note with the attachments it owns.
    pub fn export_note(&self, note_id: &str) -> StoreResult<Bundle> {
        let note = self
            .get(note_id)?
            .ok_or_else(|| StoreError::NotFound(note_id.to_string()))?;
        let images = self.list_images(note_id)?;
        let files = self.list_files(note_id)?;
        let bundle = bundle::serialize(std::slice::from_ref(&note), &images, &files);

        info!(
            "event=export module=transfer status=ok scope=note note_id={note_id} images={} files={}",
            bundle.images.len(),
            bundle.files.len()
        );
        Ok(bundle)
    }

    /// Exports the whole vault, or one note, as pretty-printed JSON.
    pub fn export_json(&self, note_id: Option<&str>) -> StoreResult<String> {
        let bundle = self.export_scope(note_id)?;
        Ok(bundle.to_json()?)
    }

    /// Merges a bundle into this vault as one transaction.
    pub fn import_bundle(&mut self, incoming: &Bundle) -> StoreResult<MergeReport> {
        let started_at = Instant::now();
        let decoded = bundle::deserialize(incoming)?;

        let report = self.in_transaction("import", |tx| Ok(merge::merge(tx, &decoded)?))?;
        self.observe_note_ids()?;

        info!(
            "event=import module=transfer status=ok duration_ms={} notes_inserted={} notes_replaced={} notes_kept={} images_inserted={} images_skipped={} files_inserted={} files_skipped={} orphans_skipped={}",
            started_at.elapsed().as_millis(),
            report.notes_inserted,
            report.notes_replaced,
            report.notes_kept,
            report.images_inserted,
            report.images_skipped,
            report.files_inserted,
            report.files_skipped,
            report.orphans_skipped
        );
        Ok(report)
    }

    /// Parses a plain export document and merges it.
    pub fn import_json(&mut self, json: &str) -> StoreResult<MergeReport> {
        let incoming = Bundle::from_json(json)?;
        self.import_bundle(&incoming)
    }

    /// Seals the whole vault, or one note, under `password`.
    pub fn export_encrypted(
        &self,
        password: &str,
        note_id: Option<&str>,
        options: &SealOptions,
    ) -> StoreResult<PenEnvelope> {
        let bundle = self.export_scope(note_id)?;
        Ok(envelope::seal(password, &bundle, options)?)
    }

    /// Opens an encrypted export document and merges its bundle.
    ///
    /// Nothing is written unless decryption and validation both succeed.
    pub fn import_encrypted(&mut self, password: &str, json: &str) -> StoreResult<MergeReport> {
        let incoming = envelope::open_json(password, json)?;
        self.import_bundle(&incoming)
    }

    fn export_scope(&self, note_id: Option<&str>) -> StoreResult<Bundle> {
        match note_id {
            Some(id) => self.export_note(id),
            None => self.export_all(),
        }
    }
}
