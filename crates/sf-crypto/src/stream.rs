//! Chunked body encryption/decryption
//!
//! The body is a sequence of sealed chunks, each `ciphertext || tag`. Every
//! plaintext chunk is [`CHUNK_SIZE`] bytes except the last, which may be
//! shorter. End of stream is physical EOF; there is no trailer.
//!
//! Chunk `i` is sealed under the DEK with the nonce produced by
//! [`NonceSequence`]: the header's base nonce for `i == 0`, and the base nonce
//! with `i` written little-endian into bytes `4..12` for `i >= 1`.

use std::io::{self, Read, Write};

use tracing::debug;

use crate::aead::AeadCipher;
use crate::error::{CryptoError, CryptoResult};
use crate::keys::DataKey;
use crate::{NONCE_SIZE, TAG_SIZE};

/// Plaintext bytes per chunk.
pub const CHUNK_SIZE: usize = 4096;

/// Largest sealed chunk on disk.
pub const SEALED_CHUNK_SIZE: usize = CHUNK_SIZE + TAG_SIZE;

/// Bytes of the nonce overwritten by the chunk counter.
const COUNTER_OFFSET: usize = NONCE_SIZE - 8;

/// Per-operation nonce state: the base nonce and a 64-bit chunk counter.
///
/// Owned by exactly one encrypt or decrypt call; never shared.
#[derive(Debug, Clone)]
pub struct NonceSequence {
    nonce: [u8; NONCE_SIZE],
    counter: u64,
}

impl NonceSequence {
    pub fn new(base: [u8; NONCE_SIZE]) -> Self {
        Self {
            nonce: base,
            counter: 0,
        }
    }

    /// Nonce for the current chunk.
    pub fn current(&self) -> &[u8; NONCE_SIZE] {
        &self.nonce
    }

    /// Index of the current chunk.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Move to the next chunk. Fails instead of wrapping the counter.
    pub fn advance(&mut self) -> CryptoResult<()> {
        self.counter = self
            .counter
            .checked_add(1)
            .ok_or(CryptoError::NonceExhausted(self.counter))?;
        self.nonce[COUNTER_OFFSET..].copy_from_slice(&self.counter.to_le_bytes());
        Ok(())
    }
}

/// Seal `reader` chunk by chunk into `writer`.
///
/// Returns the number of plaintext bytes processed.
pub fn encrypt_body<R: Read, W: Write>(
    dek: &DataKey,
    base_nonce: [u8; NONCE_SIZE],
    reader: &mut R,
    writer: &mut W,
) -> CryptoResult<u64> {
    let cipher = AeadCipher::new(dek.as_bytes());
    let mut nonces = NonceSequence::new(base_nonce);
    let mut chunk = vec![0u8; CHUNK_SIZE];
    let mut total: u64 = 0;

    loop {
        let n = read_full(reader, &mut chunk)?;
        if n == 0 {
            break;
        }

        let sealed = cipher.seal(nonces.current(), b"", &chunk[..n])?;
        writer.write_all(&sealed)?;

        total += n as u64;
        nonces.advance()?;
    }

    writer.flush()?;
    debug!(chunks = nonces.counter(), bytes = total, "body sealed");
    Ok(total)
}

/// Open sealed chunks from `reader` into `writer`.
///
/// The first chunk that fails authentication aborts the stream; nothing
/// from that chunk or any later one is written. Returns the number of
/// plaintext bytes written.
pub fn decrypt_body<R: Read, W: Write>(
    dek: &DataKey,
    base_nonce: [u8; NONCE_SIZE],
    reader: &mut R,
    writer: &mut W,
) -> CryptoResult<u64> {
    let cipher = AeadCipher::new(dek.as_bytes());
    let mut nonces = NonceSequence::new(base_nonce);
    let mut chunk = vec![0u8; SEALED_CHUNK_SIZE];
    let mut total: u64 = 0;

    loop {
        let n = read_full(reader, &mut chunk)?;
        if n == 0 {
            break;
        }

        let plaintext = cipher.open(nonces.current(), b"", &chunk[..n]).map_err(|e| {
            debug!(chunk = nonces.counter(), "chunk failed authentication");
            e
        })?;
        writer.write_all(&plaintext)?;

        total += plaintext.len() as u64;
        nonces.advance()?;
    }

    writer.flush()?;
    debug!(chunks = nonces.counter(), bytes = total, "body opened");
    Ok(total)
}

/// Read until `buf` is full or EOF. Short reads from the underlying reader
/// never split a chunk.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_data_key;
    use proptest::prelude::*;
    use std::io::Cursor;

    const BASE: [u8; NONCE_SIZE] = [0xA0, 0xA1, 0xA2, 0xA3, 0xB0, 0xB1, 0xB2, 0xB3, 0xB4, 0xB5, 0xB6, 0xB7];

    /// Reader that returns at most `step` bytes per call.
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    fn seal(dek: &DataKey, plaintext: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let n = encrypt_body(dek, BASE, &mut Cursor::new(plaintext), &mut out).unwrap();
        assert_eq!(n, plaintext.len() as u64);
        out
    }

    fn open(dek: &DataKey, sealed: &[u8]) -> CryptoResult<Vec<u8>> {
        let mut out = Vec::new();
        decrypt_body(dek, BASE, &mut Cursor::new(sealed), &mut out)?;
        Ok(out)
    }

    #[test]
    fn test_first_nonce_is_base() {
        let seq = NonceSequence::new(BASE);
        assert_eq!(seq.current(), &BASE);
        assert_eq!(seq.counter(), 0);
    }

    #[test]
    fn test_counter_written_little_endian_into_low_bytes() {
        let mut seq = NonceSequence::new(BASE);
        seq.advance().unwrap();
        assert_eq!(seq.current()[..4], BASE[..4], "prefix must not change");
        assert_eq!(seq.current()[4..], 1u64.to_le_bytes());

        for _ in 0..0x1FF {
            seq.advance().unwrap();
        }
        assert_eq!(seq.counter(), 0x200);
        assert_eq!(seq.current()[4..], [0x00, 0x02, 0, 0, 0, 0, 0, 0]);
        assert_eq!(seq.current()[..4], BASE[..4]);
    }

    #[test]
    fn test_counter_never_wraps() {
        let mut seq = NonceSequence {
            nonce: BASE,
            counter: u64::MAX,
        };
        assert!(matches!(seq.advance(), Err(CryptoError::NonceExhausted(u64::MAX))));
    }

    #[test]
    fn test_empty_body_writes_nothing() {
        let dek = generate_data_key().unwrap();
        let sealed = seal(&dek, b"");
        assert!(sealed.is_empty());
        assert!(open(&dek, &sealed).unwrap().is_empty());
    }

    #[test]
    fn test_chunk_boundaries() {
        let dek = generate_data_key().unwrap();
        for len in [1, CHUNK_SIZE - 1, CHUNK_SIZE, CHUNK_SIZE + 1, 3 * CHUNK_SIZE, 3 * CHUNK_SIZE + 17] {
            let data: Vec<u8> = (0..len).map(|i| (i * 31) as u8).collect();
            let sealed = seal(&dek, &data);

            let chunks = len.div_ceil(CHUNK_SIZE);
            assert_eq!(sealed.len(), len + chunks * TAG_SIZE, "len {len}");
            assert_eq!(open(&dek, &sealed).unwrap(), data, "len {len}");
        }
    }

    #[test]
    fn test_chunks_use_distinct_nonces() {
        let dek = generate_data_key().unwrap();
        let data = vec![0u8; 2 * CHUNK_SIZE];
        let sealed = seal(&dek, &data);

        let (first, second) = sealed.split_at(SEALED_CHUNK_SIZE);
        assert_ne!(first, second, "identical plaintext chunks must not seal identically");
    }

    #[test]
    fn test_short_reads_do_not_split_chunks() {
        let dek = generate_data_key().unwrap();
        let data: Vec<u8> = (0..(2 * CHUNK_SIZE + 5)).map(|i| i as u8).collect();

        let mut sealed = Vec::new();
        encrypt_body(&dek, BASE, &mut Trickle { data: &data, step: 7 }, &mut sealed).unwrap();
        assert_eq!(sealed, seal(&dek, &data), "output must not depend on read sizes");

        let mut out = Vec::new();
        decrypt_body(&dek, BASE, &mut Trickle { data: &sealed, step: 13 }, &mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_reordered_chunks_rejected() {
        let dek = generate_data_key().unwrap();
        let data = vec![7u8; 2 * CHUNK_SIZE];
        let sealed = seal(&dek, &data);

        let mut swapped = sealed[SEALED_CHUNK_SIZE..].to_vec();
        swapped.extend_from_slice(&sealed[..SEALED_CHUNK_SIZE]);
        assert!(open(&dek, &swapped).unwrap_err().is_authentication());
    }

    #[test]
    fn test_truncated_tail_rejected() {
        let dek = generate_data_key().unwrap();
        let sealed = seal(&dek, &[1u8; 100]);
        assert!(open(&dek, &sealed[..sealed.len() - 1]).unwrap_err().is_authentication());
    }

    #[test]
    fn test_tamper_stops_before_later_chunks() {
        let dek = generate_data_key().unwrap();
        let data: Vec<u8> = (0..(3 * CHUNK_SIZE)).map(|i| (i % 251) as u8).collect();
        let mut sealed = seal(&dek, &data);

        // Corrupt the second chunk.
        sealed[SEALED_CHUNK_SIZE + 10] ^= 0x01;

        let mut out = Vec::new();
        let err = decrypt_body(&dek, BASE, &mut Cursor::new(&sealed), &mut out).unwrap_err();
        assert!(err.is_authentication());
        assert_eq!(out, data[..CHUNK_SIZE], "only the chunk before the corruption is emitted");
    }

    #[test]
    fn test_wrong_key_fails_first_chunk() {
        let dek = generate_data_key().unwrap();
        let other = generate_data_key().unwrap();
        let sealed = seal(&dek, b"hello");

        let mut out = Vec::new();
        let err = decrypt_body(&other, BASE, &mut Cursor::new(&sealed), &mut out).unwrap_err();
        assert!(err.is_authentication());
        assert!(out.is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn body_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..=(3 * CHUNK_SIZE + 100))) {
            let dek = DataKey::from_bytes([0x11; crate::KEY_SIZE]);
            let sealed = seal(&dek, &data);
            prop_assert_eq!(open(&dek, &sealed).unwrap(), data);
        }

        #[test]
        fn single_bit_flip_detected(
            len in 1usize..=(2 * CHUNK_SIZE + 10),
            pos in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let dek = DataKey::from_bytes([0x22; crate::KEY_SIZE]);
            let data = vec![0x5Au8; len];
            let mut sealed = seal(&dek, &data);
            let i = pos.index(sealed.len());
            sealed[i] ^= 1 << bit;
            prop_assert!(open(&dek, &sealed).unwrap_err().is_authentication());
        }
    }
}
