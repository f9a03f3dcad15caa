//! Channel credential hashing.
//!
//! argon2id with a per-credential random salt, encoded as a PHC string
//! so the parameters travel with the hash. Consumers of [`verify`] treat
//! the encoded form as opaque.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("credential hashing failed: {0}")]
    Hash(String),

    /// The stored encoding could not be parsed or compared.
    #[error("stored credential is malformed: {0}")]
    Malformed(String),
}

/// Hash a plaintext credential into a PHC string.
pub fn hash(plaintext: &str) -> Result<String, HashError> {
    let salt = SaltString::generate(&mut OsRng);
    let encoded = Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|e| HashError::Hash(e.to_string()))?;

    Ok(encoded.to_string())
}

/// Compare a presented credential against a stored PHC string.
///
/// A mismatch is `Ok(false)`; `Err` means the stored encoding itself is
/// unusable.
pub fn verify(encoded: &str, presented: &[u8]) -> Result<bool, HashError> {
    let parsed = PasswordHash::new(encoded).map_err(|e| HashError::Malformed(e.to_string()))?;

    match Argon2::default().verify_password(presented, &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(HashError::Malformed(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let encoded = hash("abc").unwrap();
        assert!(verify(&encoded, b"abc").unwrap());
    }

    #[test]
    fn wrong_credential_is_a_mismatch_not_an_error() {
        let encoded = hash("abc").unwrap();
        assert!(!verify(&encoded, b"wrong").unwrap());
    }

    #[test]
    fn salts_differ_between_hashes() {
        assert_ne!(hash("abc").unwrap(), hash("abc").unwrap());
    }

    #[test]
    fn garbage_encoding_is_an_error() {
        assert!(matches!(
            verify("not-a-phc-string", b"abc"),
            Err(HashError::Malformed(_))
        ));
    }
}
