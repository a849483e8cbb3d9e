//! ChaCha20-Poly1305 seal/open adapter
//!
//! Sealed output is `ciphertext || 16-byte tag`. The nonce is supplied by the
//! caller; this module never generates one.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};

use crate::error::{CryptoError, CryptoResult};
use crate::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};

/// An AEAD instance bound to one 256-bit key.
pub struct AeadCipher {
    cipher: ChaCha20Poly1305,
}

impl AeadCipher {
    pub fn new(key: &[u8; KEY_SIZE]) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(key.into()),
        }
    }

    /// Encrypt and authenticate `plaintext`.
    pub fn seal(
        &self,
        nonce: &[u8; NONCE_SIZE],
        aad: &[u8],
        plaintext: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        self.cipher
            .encrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|e| CryptoError::Cipher(format!("seal failed: {e}")))
    }

    /// Verify and decrypt `sealed` (`ciphertext || tag`).
    ///
    /// Any mismatch (wrong key, wrong nonce, flipped bit, truncated input)
    /// yields [`CryptoError::Authentication`] and no plaintext.
    pub fn open(
        &self,
        nonce: &[u8; NONCE_SIZE],
        aad: &[u8],
        sealed: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        if sealed.len() < TAG_SIZE {
            return Err(CryptoError::Authentication);
        }

        self.cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload { msg: sealed, aad },
            )
            .map_err(|_| CryptoError::Authentication)
    }
}

impl std::fmt::Debug for AeadCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AeadCipher")
            .field("algorithm", &"ChaCha20-Poly1305")
            .finish()
    }
}
