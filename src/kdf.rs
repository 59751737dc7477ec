//! Password to key derivation
//!
//! The confirmed password is stretched with scrypt into 32 bytes of key
//! material, which are then armored as unpadded URL-safe base64 so they
//! can be handed to the cipher service as its passphrase.
//!
//! The salt is fixed: the same password must always yield the same key,
//! because nothing besides the ciphertext is persisted between the
//! encrypt and decrypt runs. The cipher service salts its own S2K.

use crate::error::{ErrorCategory, ErrorKind, Result, SymcryptError};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use scrypt::{Params, scrypt};
use std::fmt;
use zeroize::Zeroizing;

/// Application salt
const SALT: &[u8] = b"symcrypt/v1/kdf";

/// Length of derived key in bytes
const KEY_LEN: usize = 32;

/// scrypt N parameter (CPU/memory cost), as log2
const SCRYPT_LOG_N: u8 = 15;

/// scrypt r parameter (block size)
const SCRYPT_R: u32 = 8;

/// scrypt p parameter (parallelization)
const SCRYPT_P: u32 = 1;

/// Key material handed to the cipher service.
pub struct DerivedKey {
    armored: Zeroizing<String>,
}

impl DerivedKey {
    /// Wraps already-derived key text. Mostly useful for tests.
    pub fn from_armored(armored: impl Into<String>) -> Self {
        Self {
            armored: Zeroizing::new(armored.into()),
        }
    }

    /// The key in the textual form the cipher service consumes.
    pub fn expose(&self) -> &str {
        &self.armored
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey(<redacted>)")
    }
}

/// Derive key material from a password.
pub fn derive_key(passphrase: &[u8]) -> Result<DerivedKey> {
    let params = Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, KEY_LEN).map_err(|e| {
        SymcryptError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::KeyDerivation,
            format!("failed to create scrypt params: {}", e),
        )
    })?;

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    scrypt(passphrase, SALT, &params, &mut *key).map_err(|e| {
        SymcryptError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::KeyDerivation,
            format!("scrypt key derivation failed: {}", e),
        )
    })?;

    Ok(DerivedKey {
        armored: Zeroizing::new(URL_SAFE_NO_PAD.encode(key.as_slice())),
    })
}
