use pen_core::codec::{decode_base64, encode_base64};
use pen_core::envelope::kdf::MIN_SEAL_ITERATIONS;
use pen_core::envelope;
use pen_core::{
    AttachmentPayload, EnvelopeError, NotePatch, PenEnvelope, SealOptions, StoreError, VaultStore,
};

fn fast_options() -> SealOptions {
    SealOptions {
        iterations: MIN_SEAL_ITERATIONS,
        hint: Some("stable".to_string()),
    }
}

fn two_note_store() -> VaultStore {
    let mut store = VaultStore::open_in_memory().unwrap();
    for content in ["first #a", "second [[First]]"] {
        let note = store.create().unwrap();
        store
            .update(&note.id, &NotePatch::content(content))
            .unwrap();
        store
            .add_file(
                &note.id,
                AttachmentPayload::new("raw.bin", vec![0, 159, 146, 150, 255]),
            )
            .unwrap();
    }
    store
}

fn flip_ciphertext_byte(sealed: &PenEnvelope, index: usize) -> PenEnvelope {
    let mut bytes = decode_base64(&sealed.ciphertext).unwrap();
    bytes[index] ^= 0x01;
    PenEnvelope {
        ciphertext: encode_base64(&bytes),
        ..sealed.clone()
    }
}

#[test]
fn seal_then_open_returns_the_same_bundle() {
    let store = two_note_store();
    let bundle = store.export_all().unwrap();

    let sealed = envelope::seal("correct-horse", &bundle, &fast_options()).unwrap();
    assert_eq!(sealed.kdf.iterations, MIN_SEAL_ITERATIONS);
    assert_eq!(
        sealed.meta.as_ref().and_then(|meta| meta.hint.as_deref()),
        Some("stable")
    );

    let json = sealed.to_json().unwrap();
    assert!(!json.contains("first #a"));
    assert_eq!(envelope::open_json("correct-horse", &json).unwrap(), bundle);
}

#[test]
fn wrong_password_is_a_decrypt_error() {
    let bundle = two_note_store().export_all().unwrap();
    assert_eq!(bundle.notes.len(), 2);
    let sealed = envelope::seal("correct-horse", &bundle, &fast_options()).unwrap();

    assert!(matches!(
        envelope::open("wrong-password", &sealed),
        Err(EnvelopeError::Decrypt)
    ));
}

#[test]
fn flipped_ciphertext_bytes_never_open() {
    let bundle = two_note_store().export_all().unwrap();
    let sealed = envelope::seal("correct-horse", &bundle, &fast_options()).unwrap();
    let len = decode_base64(&sealed.ciphertext).unwrap().len();

    for index in [0, len / 2, len - 1] {
        let tampered = flip_ciphertext_byte(&sealed, index);
        assert!(
            matches!(
                envelope::open("correct-horse", &tampered),
                Err(EnvelopeError::Decrypt)
            ),
            "byte {index} flipped but container still opened"
        );
    }
}

#[test]
fn weak_work_factor_is_refused_on_seal() {
    let bundle = two_note_store().export_all().unwrap();
    let options = SealOptions {
        iterations: 10_000,
        hint: None,
    };
    assert!(matches!(
        envelope::seal("correct-horse", &bundle, &options),
        Err(EnvelopeError::IterationsBelowMinimum { .. })
    ));
}

#[test]
fn encrypted_export_imports_into_fresh_store() {
    let source = two_note_store();
    let sealed = source
        .export_encrypted("correct-horse", None, &fast_options())
        .unwrap();
    let json = sealed.to_json().unwrap();

    let mut target = VaultStore::open_in_memory().unwrap();
    let report = target.import_encrypted("correct-horse", &json).unwrap();

    assert_eq!(report.notes_inserted, 2);
    assert_eq!(report.files_inserted, 2);
    assert_eq!(target.list().unwrap(), source.list().unwrap());
}

#[test]
fn failed_decrypt_writes_nothing() {
    let source = two_note_store();
    let json = source
        .export_encrypted("correct-horse", None, &fast_options())
        .unwrap()
        .to_json()
        .unwrap();

    let mut target = VaultStore::open_in_memory().unwrap();
    let err = target.import_encrypted("wrong-password", &json).unwrap_err();

    assert!(matches!(err, StoreError::Envelope(EnvelopeError::Decrypt)));
    assert!(target.list().unwrap().is_empty());
    assert!(target.list_all_files().unwrap().is_empty());
}

#[test]
fn container_from_an_unknown_format_is_rejected() {
    let json = r#"{"format": "other", "version": 1, "ciphertext": ""}"#;
    assert!(matches!(
        envelope::open_json("correct-horse", json),
        Err(EnvelopeError::UnsupportedContainer(_))
    ));

    let future = r#"{"format": "pen", "version": 9, "ciphertext": ""}"#;
    assert!(matches!(
        PenEnvelope::from_json(future),
        Err(EnvelopeError::UnsupportedContainer(_))
    ));
}
