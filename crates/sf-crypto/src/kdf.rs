//! Key derivation: Argon2id password + salt → key-encryption key

use argon2::{Algorithm, Argon2, Params, Version};
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::rng::random_array;
use crate::{KEY_SIZE, SALT_SIZE};

/// A 256-bit key-encryption key derived from a password via Argon2id.
///
/// Only ever used to wrap and unwrap a [`DataKey`](crate::DataKey).
/// Zeroized on drop.
pub struct KeyEncryptionKey {
    bytes: [u8; KEY_SIZE],
}

impl KeyEncryptionKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for KeyEncryptionKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for KeyEncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyEncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Argon2id cost parameters.
///
/// These are not recorded in the file header. A file can only be decrypted
/// with the same parameters it was encrypted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub mem_cost_kib: u32,
    /// Time cost / iterations (default: 1)
    pub time_cost: u32,
    /// Parallelism (default: 4)
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            mem_cost_kib: 64 * 1024,
            time_cost: 1,
            parallelism: 4,
        }
    }
}

impl KdfParams {
    /// Cheap parameters for tests and benches. Files written with these
    /// cannot be read by the CLI.
    pub fn fast_insecure() -> Self {
        Self {
            mem_cost_kib: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }
}

/// Derive a KEK from `password`, generating a fresh salt when `salt` is `None`.
///
/// Returns the salt actually used together with the key so the caller can
/// store it in the header.
pub fn derive_kek(
    password: &SecretString,
    salt: Option<&[u8; SALT_SIZE]>,
    params: &KdfParams,
) -> CryptoResult<([u8; SALT_SIZE], KeyEncryptionKey)> {
    let salt = match salt {
        Some(s) => *s,
        None => random_array::<SALT_SIZE>()?,
    };

    let argon2_params = Params::new(
        params.mem_cost_kib,
        params.time_cost,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| CryptoError::Kdf(format!("invalid Argon2id params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(password.expose_secret().as_bytes(), &salt, &mut key)
        .map_err(|e| CryptoError::Kdf(format!("Argon2id failed: {e}")))?;

    let kek = KeyEncryptionKey::from_bytes(key);
    key.zeroize();

    Ok((salt, kek))
}
