use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

/// Every failure aborts the whole file operation. Output written before the
/// failure is incomplete and must not be trusted.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Missing or unusable input (not found, is a directory).
    #[error("input error: {0}")]
    Input(String),

    /// Structural problem with an encrypted file: too short, wrong signature,
    /// truncated header.
    #[error("invalid file format: {0}")]
    Format(String),

    /// Wrapped key or body chunk failed to authenticate. The two causes
    /// (wrong password, tampered bytes) are reported identically.
    #[error("password incorrect or file corrupted")]
    Authentication,

    #[error("output already exists: {0}")]
    OutputExists(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("secure random generation failed: {0}")]
    Random(String),

    #[error("key derivation failed: {0}")]
    Kdf(String),

    #[error("cipher error: {0}")]
    Cipher(String),

    #[error("chunk nonce counter exhausted after {0} chunks")]
    NonceExhausted(u64),
}

impl CryptoError {
    /// True for errors that mean "wrong password or tampered file".
    pub fn is_authentication(&self) -> bool {
        matches!(self, CryptoError::Authentication)
    }

    pub fn is_format(&self) -> bool {
        matches!(self, CryptoError::Format(_))
    }
}
