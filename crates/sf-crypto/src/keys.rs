//! Per-file data encryption key: generation, wrapping under the KEK

use zeroize::Zeroize;

use crate::aead::AeadCipher;
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::KeyEncryptionKey;
use crate::rng::fill_random;
use crate::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};

/// Size of a wrapped DEK: ciphertext (32) + tag (16)
pub const WRAPPED_KEY_SIZE: usize = KEY_SIZE + TAG_SIZE;

/// A per-file 256-bit data encryption key. Zeroized on drop.
pub struct DataKey {
    bytes: [u8; KEY_SIZE],
}

impl DataKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for DataKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for DataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a random 256-bit data encryption key.
///
/// Filled in place; the key bytes never exist outside the returned value.
pub fn generate_data_key() -> CryptoResult<DataKey> {
    let mut dek = DataKey::from_bytes([0u8; KEY_SIZE]);
    fill_random(&mut dek.bytes)?;
    Ok(dek)
}

/// Wrap (encrypt) a DEK under the KEK with the file's base nonce and empty AAD.
///
/// Output: `[32-byte ciphertext][16-byte tag]`
pub fn wrap_key(
    kek: &KeyEncryptionKey,
    nonce: &[u8; NONCE_SIZE],
    dek: &DataKey,
) -> CryptoResult<[u8; WRAPPED_KEY_SIZE]> {
    let sealed = AeadCipher::new(kek.as_bytes()).seal(nonce, b"", dek.as_bytes())?;

    if sealed.len() != WRAPPED_KEY_SIZE {
        return Err(CryptoError::Cipher(format!(
            "wrapped key has wrong size: {} bytes (expected {WRAPPED_KEY_SIZE})",
            sealed.len()
        )));
    }

    let mut wrapped = [0u8; WRAPPED_KEY_SIZE];
    wrapped.copy_from_slice(&sealed);
    Ok(wrapped)
}

/// Unwrap (decrypt) a DEK with the KEK.
///
/// A wrong password and a tampered header both surface as
/// [`CryptoError::Authentication`].
pub fn unwrap_key(
    kek: &KeyEncryptionKey,
    nonce: &[u8; NONCE_SIZE],
    wrapped: &[u8; WRAPPED_KEY_SIZE],
) -> CryptoResult<DataKey> {
    let mut plaintext = AeadCipher::new(kek.as_bytes()).open(nonce, b"", wrapped)?;

    if plaintext.len() != KEY_SIZE {
        plaintext.zeroize();
        return Err(CryptoError::Format(format!(
            "unwrapped key has wrong size: {} bytes (expected {KEY_SIZE})",
            plaintext.len()
        )));
    }

    let mut key_bytes = [0u8; KEY_SIZE];
    key_bytes.copy_from_slice(&plaintext);
    plaintext.zeroize();

    let dek = DataKey::from_bytes(key_bytes);
    key_bytes.zeroize();
    Ok(dek)
}
