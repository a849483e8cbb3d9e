//! Secure random source for keys, nonces and salts
//!
//! Reads straight from the operating system RNG. Failures surface as
//! [`CryptoError::Random`] and abort the operation.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{CryptoError, CryptoResult};

/// Fill `buf` with OS randomness.
pub fn fill_random(buf: &mut [u8]) -> CryptoResult<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| CryptoError::Random(e.to_string()))
}

/// Return a fresh array of `N` random bytes.
pub fn random_array<const N: usize>() -> CryptoResult<[u8; N]> {
    let mut bytes = [0u8; N];
    fill_random(&mut bytes)?;
    Ok(bytes)
}
