//! sf-crypto: password-based file encryption at rest
//!
//! Architecture: envelope encryption with a chunked ChaCha20-Poly1305 body
//!
//! Pipeline: password → Argon2id KEK → wrap random DEK → header → seal body in 4 KiB chunks
//!
//! Key hierarchy:
//! ```text
//! Key-Encryption Key (256-bit, Argon2id from password + 16-byte salt, never stored)
//!   └── Data Encryption Key (per-file, 256-bit random, stored wrapped in the header)
//!       └── Chunk AEAD: ChaCha20-Poly1305 (key=DEK, nonce=base_nonce with LE counter in bytes 4..12)
//! ```
//!
//! On-disk layout:
//! ```text
//! [8: "CHAPOLYX"][12: base nonce][16: salt][48: wrapped DEK + tag][sealed chunks ...]
//! ```

pub mod aead;
pub mod error;
pub mod header;
pub mod kdf;
pub mod keys;
pub mod pipeline;
pub mod rng;
pub mod stream;

pub use aead::AeadCipher;
pub use error::{CryptoError, CryptoResult};
pub use header::{FileHeader, HEADER_SIZE, SIGNATURE};
pub use kdf::{derive_kek, KdfParams, KeyEncryptionKey};
pub use keys::{generate_data_key, DataKey};
pub use pipeline::{decrypt_file, encrypt_file, FileCipher, Outcome};
pub use stream::{decrypt_body, encrypt_body, NonceSequence, CHUNK_SIZE};

/// Size of a KEK or DEK in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of a ChaCha20-Poly1305 (IETF) nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;

/// Size of the Argon2id salt stored in the header
pub const SALT_SIZE: usize = 16;
