//! Authenticated encryption for envelope payloads.
//!
//! AES-256-GCM. Key: 32 bytes. Nonce: 12 bytes (random). Tag: 16 bytes,
//! appended to the ciphertext.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use super::kdf::KEY_LEN;

pub const CIPHER_NAME: &str = "AES-GCM";
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// Opaque AEAD failure. Carries no detail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AeadFailure;

/// Generates a fresh random nonce.
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Encrypts `plaintext`, returning `ciphertext || tag`.
pub fn encrypt(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
) -> Result<Vec<u8>, AeadFailure> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| AeadFailure)?;
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| AeadFailure)
}

/// Decrypts and authenticates `ciphertext || tag`.
pub fn decrypt(
    key: &[u8; KEY_LEN],
    nonce: &[u8],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, AeadFailure> {
    if nonce.len() != NONCE_LEN || ciphertext.len() < TAG_LEN {
        return Err(AeadFailure);
    }
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| AeadFailure)?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| AeadFailure)?;
    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_then_decrypt_roundtrips() {
        let key = [3u8; KEY_LEN];
        let nonce = generate_nonce();
        let sealed = encrypt(&key, &nonce, b"hello vault").unwrap();
        assert_eq!(sealed.len(), b"hello vault".len() + TAG_LEN);
        let opened = decrypt(&key, &nonce, &sealed).unwrap();
        assert_eq!(opened.as_slice(), b"hello vault");
    }

    #[test]
    fn decrypt_rejects_short_nonce_and_truncated_tag() {
        let key = [3u8; KEY_LEN];
        let nonce = generate_nonce();
        let sealed = encrypt(&key, &nonce, b"x").unwrap();
        assert!(matches!(decrypt(&key, &nonce[..8], &sealed), Err(AeadFailure)));
        assert!(matches!(decrypt(&key, &nonce, &sealed[..4]), Err(AeadFailure)));
    }
}
