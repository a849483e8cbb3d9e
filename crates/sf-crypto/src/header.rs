//! Fixed-layout file header
//!
//! ```text
//! offset  0: [8 bytes: signature "CHAPOLYX"]
//! offset  8: [12 bytes: base nonce]
//! offset 20: [16 bytes: Argon2id salt]
//! offset 36: [48 bytes: DEK sealed under the KEK with the base nonce]
//! offset 84: body
//! ```

use std::io::{self, Read, Write};

use secrecy::SecretString;

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{derive_kek, KdfParams, KeyEncryptionKey};
use crate::keys::{unwrap_key, wrap_key, DataKey, WRAPPED_KEY_SIZE};
use crate::{NONCE_SIZE, SALT_SIZE};

/// ASCII magic identifying the format (and, implicitly, its version).
pub const SIGNATURE: &[u8; 8] = b"CHAPOLYX";

/// Total header length. Also the minimum size of a valid encrypted file
/// (an empty plaintext produces a header and no chunks).
pub const HEADER_SIZE: usize = SIGNATURE.len() + NONCE_SIZE + SALT_SIZE + WRAPPED_KEY_SIZE;

const NONCE_OFFSET: usize = SIGNATURE.len();
const SALT_OFFSET: usize = NONCE_OFFSET + NONCE_SIZE;
const WRAPPED_OFFSET: usize = SALT_OFFSET + SALT_SIZE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub nonce: [u8; NONCE_SIZE],
    pub salt: [u8; SALT_SIZE],
    pub wrapped_key: [u8; WRAPPED_KEY_SIZE],
}

impl FileHeader {
    /// Build a header by wrapping `dek` under `kek` with `nonce`.
    pub fn seal(
        kek: &KeyEncryptionKey,
        dek: &DataKey,
        nonce: [u8; NONCE_SIZE],
        salt: [u8; SALT_SIZE],
    ) -> CryptoResult<Self> {
        let wrapped_key = wrap_key(kek, &nonce, dek)?;
        Ok(Self {
            nonce,
            salt,
            wrapped_key,
        })
    }

    /// Recover the DEK from an already-derived KEK.
    pub fn unwrap_key(&self, kek: &KeyEncryptionKey) -> CryptoResult<DataKey> {
        unwrap_key(kek, &self.nonce, &self.wrapped_key)
    }

    /// Derive the KEK from `password` and the stored salt, then unwrap the DEK.
    pub fn open(&self, password: &SecretString, params: &KdfParams) -> CryptoResult<DataKey> {
        let (_, kek) = derive_kek(password, Some(&self.salt), params)?;
        self.unwrap_key(&kek)
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[..NONCE_OFFSET].copy_from_slice(SIGNATURE);
        out[NONCE_OFFSET..SALT_OFFSET].copy_from_slice(&self.nonce);
        out[SALT_OFFSET..WRAPPED_OFFSET].copy_from_slice(&self.salt);
        out[WRAPPED_OFFSET..].copy_from_slice(&self.wrapped_key);
        out
    }

    /// Parse a header from the first [`HEADER_SIZE`] bytes of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(CryptoError::Format(format!(
                "file too short: {} bytes (minimum {HEADER_SIZE})",
                bytes.len()
            )));
        }
        check_signature(&bytes[..NONCE_OFFSET])?;
        Ok(Self::from_fields(&bytes[NONCE_OFFSET..HEADER_SIZE]))
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> CryptoResult<()> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }

    /// Read and validate a header: the signature is checked before the
    /// remaining fields are read.
    pub fn read_from<R: Read>(reader: &mut R) -> CryptoResult<Self> {
        let mut signature = [0u8; SIGNATURE.len()];
        read_exact_or_format(reader, &mut signature, "signature")?;
        check_signature(&signature)?;

        let mut fields = [0u8; HEADER_SIZE - SIGNATURE.len()];
        read_exact_or_format(reader, &mut fields, "header")?;
        Ok(Self::from_fields(&fields))
    }

    /// `fields` is everything after the signature, exactly
    /// `HEADER_SIZE - SIGNATURE.len()` bytes.
    fn from_fields(fields: &[u8]) -> Self {
        let mut nonce = [0u8; NONCE_SIZE];
        let mut salt = [0u8; SALT_SIZE];
        let mut wrapped_key = [0u8; WRAPPED_KEY_SIZE];

        let (n, rest) = fields.split_at(NONCE_SIZE);
        let (s, w) = rest.split_at(SALT_SIZE);
        nonce.copy_from_slice(n);
        salt.copy_from_slice(s);
        wrapped_key.copy_from_slice(&w[..WRAPPED_KEY_SIZE]);

        Self {
            nonce,
            salt,
            wrapped_key,
        }
    }
}

fn check_signature(found: &[u8]) -> CryptoResult<()> {
    if found != SIGNATURE {
        return Err(CryptoError::Format("file signature is invalid".into()));
    }
    Ok(())
}

fn read_exact_or_format<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> CryptoResult<()> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(CryptoError::Format(format!(
            "truncated header: could not read the {what}"
        ))),
        Err(e) => Err(CryptoError::Io(e)),
    }
}
