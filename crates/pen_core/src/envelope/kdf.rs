//! Password-based key derivation (PBKDF2-HMAC-SHA256).
//!
//! `derive_key`: 32-byte AES key from a password + 16-byte salt.
//! `generate_salt`: fresh random salt from the OS CSPRNG.

use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

pub const KDF_NAME: &str = "PBKDF2";
pub const KDF_HASH: &str = "SHA-256";

pub const SALT_LEN: usize = 16;
pub const KEY_LEN: usize = 32;

/// Work factor written into new envelopes.
pub const DEFAULT_ITERATIONS: u32 = 200_000;
/// Lowest work factor accepted for newly written envelopes.
pub const MIN_SEAL_ITERATIONS: u32 = 150_000;
/// Highest stored work factor a reader will attempt.
pub const MAX_OPEN_ITERATIONS: u32 = 10_000_000;

/// Derives the envelope key. The key is zeroized on drop.
pub fn derive_key(password: &str, salt: &[u8], iterations: u32) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key[..]);
    key
}

/// Generates a fresh random salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_key_is_deterministic_per_salt_and_password() {
        let salt = [7u8; SALT_LEN];
        let first = derive_key("pw", &salt, 1_000);
        let second = derive_key("pw", &salt, 1_000);
        assert_eq!(*first, *second);

        let other_password = derive_key("pw2", &salt, 1_000);
        assert_ne!(*first, *other_password);

        let other_salt = derive_key("pw", &[8u8; SALT_LEN], 1_000);
        assert_ne!(*first, *other_salt);
    }

    #[test]
    fn derive_key_matches_rfc7914_vector() {
        // PBKDF2-HMAC-SHA256 test vector from RFC 7914 section 11.
        let key = derive_key("passwd", b"salt", 1);
        assert_eq!(&key[..8], &[0x55, 0xac, 0x04, 0x6e, 0x56, 0xe3, 0x08, 0x9f]);
    }

    #[test]
    fn generate_salt_differs_between_calls() {
        assert_ne!(generate_salt(), generate_salt());
    }
}
