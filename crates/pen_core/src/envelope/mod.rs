//! Password-encrypted container (`PenContainerV1`) wrapping a bundle.
//!
//! # Responsibility
//! - Seal a bundle under a password-derived key with authenticated encryption.
//! - Open a sealed container, rejecting unknown container versions up front.
//!
//! # Invariants
//! - Nothing is cached between calls; salt, nonce and key are fresh per seal.
//! - The stored iteration count is the one used at write time and is the one
//!   used to re-derive on open.
//! - Every failure after the container is recognized collapses to
//!   `EnvelopeError::Decrypt`.
//! - `app` and `meta` are written in the clear and never hold secrets.

pub mod aead;
pub mod kdf;

use crate::bundle::Bundle;
use crate::codec;
use crate::db::migrations::latest_version;
use crate::model::now_millis;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;

pub const FORMAT: &str = "pen";
pub const VERSION: u32 = 1;
pub const APP_NAME: &str = "pen";

/// Mime type of encrypted exports.
pub const ENVELOPE_MIME: &str = "application/pen+json";
/// File extension of encrypted exports.
pub const ENVELOPE_EXTENSION: &str = ".pen.json";

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("unsupported container: {0}")]
    UnsupportedContainer(String),
    /// Wrong password, corrupted or tampered container. Deliberately opaque.
    #[error("unable to decrypt container")]
    Decrypt,
    #[error("malformed container document: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("password cannot be empty")]
    EmptyPassword,
    #[error("kdf iterations {requested} below minimum {minimum}")]
    IterationsBelowMinimum { requested: u32, minimum: u32 },
    #[error("encryption failed")]
    Encrypt,
}

/// Wire form of the encrypted container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenEnvelope {
    pub format: String,
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<AppInfo>,
    pub kdf: KdfParams,
    pub cipher: CipherParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<EnvelopeMeta>,
    #[serde(alias = "ct_b64")]
    pub ciphertext: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub name: String,
    /// Store schema version of the writer.
    pub schema: u32,
    pub build: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub name: String,
    pub hash: String,
    pub iterations: u32,
    #[serde(alias = "salt_b64")]
    pub salt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherParams {
    pub name: String,
    #[serde(alias = "iv_b64")]
    pub iv: String,
}

/// Clear-text metadata. Not authenticated, not secret.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeMeta {
    #[serde(default, alias = "date", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "notes", skip_serializing_if = "Option::is_none")]
    pub notes_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// Options for `seal`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealOptions {
    pub iterations: u32,
    /// Optional password hint stored in clear-text `meta`.
    pub hint: Option<String>,
}

impl Default for SealOptions {
    fn default() -> Self {
        Self {
            iterations: kdf::DEFAULT_ITERATIONS,
            hint: None,
        }
    }
}

impl PenEnvelope {
    /// Parses a container document.
    ///
    /// `format`/`version` are checked on the raw document first, so a future
    /// container with a different layout reports `UnsupportedContainer`
    /// instead of a parse error.
    pub fn from_json(json: &str) -> Result<Self, EnvelopeError> {
        let raw: serde_json::Value = serde_json::from_str(json)?;
        let format = raw.get("format").and_then(serde_json::Value::as_str);
        let version = raw.get("version").and_then(serde_json::Value::as_u64);
        check_format_version(format, version)?;
        Ok(serde_json::from_value(raw)?)
    }

    /// Pretty-printed JSON document.
    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Rejects containers this reader does not understand.
    pub fn ensure_supported(&self) -> Result<(), EnvelopeError> {
        check_format_version(Some(self.format.as_str()), Some(u64::from(self.version)))?;
        if self.kdf.name != kdf::KDF_NAME || self.kdf.hash != kdf::KDF_HASH {
            return Err(EnvelopeError::UnsupportedContainer(format!(
                "kdf {}/{}",
                self.kdf.name, self.kdf.hash
            )));
        }
        if self.cipher.name != aead::CIPHER_NAME {
            return Err(EnvelopeError::UnsupportedContainer(format!(
                "cipher {}",
                self.cipher.name
            )));
        }
        if self.kdf.iterations == 0 || self.kdf.iterations > kdf::MAX_OPEN_ITERATIONS {
            return Err(EnvelopeError::UnsupportedContainer(format!(
                "kdf iterations {}",
                self.kdf.iterations
            )));
        }
        Ok(())
    }
}

/// Seals `bundle` under `password`.
pub fn seal(
    password: &str,
    bundle: &Bundle,
    options: &SealOptions,
) -> Result<PenEnvelope, EnvelopeError> {
    if options.iterations < kdf::MIN_SEAL_ITERATIONS {
        return Err(EnvelopeError::IterationsBelowMinimum {
            requested: options.iterations,
            minimum: kdf::MIN_SEAL_ITERATIONS,
        });
    }
    seal_with_iterations(password, bundle, options)
}

/// Opens `envelope` with `password` and returns the wrapped bundle.
pub fn open(password: &str, envelope: &PenEnvelope) -> Result<Bundle, EnvelopeError> {
    let started_at = Instant::now();
    envelope.ensure_supported()?;

    match open_supported(password, envelope) {
        Ok(bundle) => {
            info!(
                "event=envelope_open module=envelope status=ok duration_ms={} iterations={} notes={}",
                started_at.elapsed().as_millis(),
                envelope.kdf.iterations,
                bundle.notes.len()
            );
            Ok(bundle)
        }
        Err(err) => {
            warn!(
                "event=envelope_open module=envelope status=error duration_ms={} error_code=decrypt_failed",
                started_at.elapsed().as_millis()
            );
            Err(err)
        }
    }
}

/// Parses a container document and opens it.
pub fn open_json(password: &str, json: &str) -> Result<Bundle, EnvelopeError> {
    let envelope = PenEnvelope::from_json(json)?;
    open(password, &envelope)
}

// Shared by `seal` and tests that need a cheap work factor.
fn seal_with_iterations(
    password: &str,
    bundle: &Bundle,
    options: &SealOptions,
) -> Result<PenEnvelope, EnvelopeError> {
    if password.is_empty() {
        return Err(EnvelopeError::EmptyPassword);
    }
    let started_at = Instant::now();

    let plaintext = zeroize::Zeroizing::new(serde_json::to_vec(bundle)?);
    let salt = kdf::generate_salt();
    let nonce = aead::generate_nonce();
    let key = kdf::derive_key(password, &salt, options.iterations);
    let ciphertext =
        aead::encrypt(&key, &nonce, &plaintext).map_err(|_| EnvelopeError::Encrypt)?;

    let envelope = PenEnvelope {
        format: FORMAT.to_string(),
        version: VERSION,
        app: Some(AppInfo {
            name: APP_NAME.to_string(),
            schema: latest_version(),
            build: env!("CARGO_PKG_VERSION").to_string(),
        }),
        kdf: KdfParams {
            name: kdf::KDF_NAME.to_string(),
            hash: kdf::KDF_HASH.to_string(),
            iterations: options.iterations,
            salt: codec::encode_base64(&salt),
        },
        cipher: CipherParams {
            name: aead::CIPHER_NAME.to_string(),
            iv: codec::encode_base64(&nonce),
        },
        meta: Some(EnvelopeMeta {
            created_at: Some(now_millis()),
            notes_count: Some(bundle.notes.len() as u64),
            hint: options.hint.clone().filter(|hint| !hint.trim().is_empty()),
        }),
        ciphertext: codec::encode_base64(&ciphertext),
    };

    info!(
        "event=envelope_seal module=envelope status=ok duration_ms={} iterations={} notes={} ciphertext_bytes={}",
        started_at.elapsed().as_millis(),
        options.iterations,
        bundle.notes.len(),
        ciphertext.len()
    );
    Ok(envelope)
}

fn open_supported(password: &str, envelope: &PenEnvelope) -> Result<Bundle, EnvelopeError> {
    let salt = codec::decode_base64(&envelope.kdf.salt).map_err(|_| EnvelopeError::Decrypt)?;
    let nonce = codec::decode_base64(&envelope.cipher.iv).map_err(|_| EnvelopeError::Decrypt)?;
    let ciphertext =
        codec::decode_base64(&envelope.ciphertext).map_err(|_| EnvelopeError::Decrypt)?;
    if salt.len() != kdf::SALT_LEN {
        return Err(EnvelopeError::Decrypt);
    }

    let key = kdf::derive_key(password, &salt, envelope.kdf.iterations);
    let plaintext =
        aead::decrypt(&key, &nonce, &ciphertext).map_err(|_| EnvelopeError::Decrypt)?;
    let text = std::str::from_utf8(&plaintext).map_err(|_| EnvelopeError::Decrypt)?;
    Bundle::from_json(text).map_err(|_| EnvelopeError::Decrypt)
}

fn check_format_version(format: Option<&str>, version: Option<u64>) -> Result<(), EnvelopeError> {
    if format != Some(FORMAT) {
        return Err(EnvelopeError::UnsupportedContainer(format!(
            "format {}",
            format.unwrap_or("<missing>")
        )));
    }
    if version != Some(u64::from(VERSION)) {
        return Err(EnvelopeError::UnsupportedContainer(format!(
            "version {}",
            version.map_or_else(|| "<missing>".to_string(), |value| value.to_string())
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::from_millis;
    use crate::model::note::Note;

    const TEST_ITERATIONS: u32 = 1_000;

    fn sample_bundle() -> Bundle {
        let mut first = Note::empty("n_1", from_millis(1_000));
        first.title = "first".to_string();
        let mut second = Note::empty("n_2", from_millis(2_000));
        second.content = "#secret plans".to_string();
        second.tags = vec!["secret".to_string()];
        Bundle {
            notes: vec![first, second],
            ..Bundle::default()
        }
    }

    fn cheap_seal(password: &str, bundle: &Bundle) -> PenEnvelope {
        let options = SealOptions {
            iterations: TEST_ITERATIONS,
            hint: Some("horse".to_string()),
        };
        seal_with_iterations(password, bundle, &options).unwrap()
    }

    #[test]
    fn every_single_byte_flip_in_ciphertext_fails_with_decrypt() {
        let bundle = Bundle {
            notes: vec![Note::empty("n_1", from_millis(0))],
            ..Bundle::default()
        };
        let envelope = cheap_seal("pw", &bundle);
        let raw = codec::decode_base64(&envelope.ciphertext).unwrap();

        for index in 0..raw.len() {
            let mut tampered_bytes = raw.clone();
            tampered_bytes[index] ^= 0x01;
            let mut tampered = envelope.clone();
            tampered.ciphertext = codec::encode_base64(&tampered_bytes);
            assert!(
                matches!(open("pw", &tampered), Err(EnvelopeError::Decrypt)),
                "flip at byte {index} was not rejected"
            );
        }
    }

    #[test]
    fn tampered_salt_or_nonce_fails_with_decrypt() {
        let envelope = cheap_seal("pw", &sample_bundle());

        let mut bad_salt = envelope.clone();
        bad_salt.kdf.salt = codec::encode_base64(&[0u8; kdf::SALT_LEN]);
        assert!(matches!(open("pw", &bad_salt), Err(EnvelopeError::Decrypt)));

        let mut short_iv = envelope.clone();
        short_iv.cipher.iv = codec::encode_base64(&[0u8; 4]);
        assert!(matches!(open("pw", &short_iv), Err(EnvelopeError::Decrypt)));

        let mut garbage = envelope;
        garbage.ciphertext = "not base64 at all!".to_string();
        assert!(matches!(open("pw", &garbage), Err(EnvelopeError::Decrypt)));
    }

    #[test]
    fn open_uses_stored_iteration_count() {
        let bundle = sample_bundle();
        let envelope = cheap_seal("pw", &bundle);
        assert_eq!(envelope.kdf.iterations, TEST_ITERATIONS);
        assert_eq!(open("pw", &envelope).unwrap(), bundle);

        let mut wrong_count = envelope;
        wrong_count.kdf.iterations = TEST_ITERATIONS + 1;
        assert!(matches!(
            open("pw", &wrong_count),
            Err(EnvelopeError::Decrypt)
        ));
    }

    #[test]
    fn metadata_is_written_in_the_clear() {
        let envelope = cheap_seal("pw", &sample_bundle());
        let meta = envelope.meta.as_ref().unwrap();
        assert_eq!(meta.notes_count, Some(2));
        assert_eq!(meta.hint.as_deref(), Some("horse"));
        assert!(meta.created_at.is_some());
        let app = envelope.app.as_ref().unwrap();
        assert_eq!(app.name, APP_NAME);
        assert_eq!(app.schema, latest_version());

        let json = envelope.to_json().unwrap();
        assert!(!json.contains("secret plans"));
        assert!(json.contains("\"ciphertext\""));
        assert!(json.contains("\"PBKDF2\""));
    }

    #[test]
    fn unknown_format_or_version_is_rejected_before_parsing() {
        let future = r#"{"format": "pen", "version": 2, "payload": "whatever"}"#;
        assert!(matches!(
            PenEnvelope::from_json(future),
            Err(EnvelopeError::UnsupportedContainer(_))
        ));

        let foreign = r#"{"format": "zip", "version": 1}"#;
        assert!(matches!(
            PenEnvelope::from_json(foreign),
            Err(EnvelopeError::UnsupportedContainer(_))
        ));

        assert!(matches!(
            PenEnvelope::from_json("not json"),
            Err(EnvelopeError::Malformed(_))
        ));
    }

    #[test]
    fn unknown_cipher_or_kdf_is_unsupported() {
        let envelope = cheap_seal("pw", &sample_bundle());

        let mut other_cipher = envelope.clone();
        other_cipher.cipher.name = "ChaCha20-Poly1305".to_string();
        assert!(matches!(
            open("pw", &other_cipher),
            Err(EnvelopeError::UnsupportedContainer(_))
        ));

        let mut zero_rounds = envelope;
        zero_rounds.kdf.iterations = 0;
        assert!(matches!(
            open("pw", &zero_rounds),
            Err(EnvelopeError::UnsupportedContainer(_))
        ));
    }

    #[test]
    fn legacy_field_names_are_accepted() {
        let envelope = cheap_seal("pw", &sample_bundle());
        let legacy = serde_json::json!({
            "format": "pen",
            "version": 1,
            "kdf": {
                "name": "PBKDF2",
                "hash": "SHA-256",
                "iterations": envelope.kdf.iterations,
                "salt_b64": envelope.kdf.salt,
            },
            "cipher": { "name": "AES-GCM", "iv_b64": envelope.cipher.iv },
            "ct_b64": envelope.ciphertext,
            "meta": { "date": "2024-05-01T10:00:00.000Z", "notes": 2 },
        });

        let parsed = PenEnvelope::from_json(&legacy.to_string()).unwrap();
        assert_eq!(parsed.meta.as_ref().unwrap().notes_count, Some(2));
        assert_eq!(open("pw", &parsed).unwrap(), sample_bundle());
    }

    #[test]
    fn seal_rejects_weak_work_factor_and_empty_password() {
        let weak = SealOptions {
            iterations: kdf::MIN_SEAL_ITERATIONS - 1,
            hint: None,
        };
        assert!(matches!(
            seal("pw", &sample_bundle(), &weak),
            Err(EnvelopeError::IterationsBelowMinimum { .. })
        ));
        assert!(matches!(
            seal("", &sample_bundle(), &SealOptions::default()),
            Err(EnvelopeError::EmptyPassword)
        ));
    }
}
