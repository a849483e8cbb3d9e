//! Input validation and output path rules
//!
//! Encrypting `notes.txt` writes `notes.txt.enc`; decrypting `notes.txt.enc`
//! writes `notes.txt`. Decryption refuses anything without the `.enc`
//! extension.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{SfError, SfResult};

/// Extension appended on encrypt and stripped on decrypt (without the dot).
pub const ENCRYPTED_EXTENSION: &str = "enc";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

impl Direction {
    /// Past-tense verb for result messages.
    pub fn past_tense(self) -> &'static str {
        match self {
            Direction::Encrypt => "encrypted",
            Direction::Decrypt => "decrypted",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Encrypt => f.write_str("enc"),
            Direction::Decrypt => f.write_str("dec"),
        }
    }
}

/// Check that `path` exists and is not a directory, and return it as an
/// absolute path (symlinks are not resolved).
pub fn validate_input(path: &Path) -> SfResult<PathBuf> {
    let meta = std::fs::metadata(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => SfError::NotFound(path.display().to_string()),
        _ => SfError::Io(e),
    })?;

    if meta.is_dir() {
        return Err(SfError::IsDirectory(path.display().to_string()));
    }

    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Output path for `input` in the given direction.
pub fn derive_output_path(direction: Direction, input: &Path) -> SfResult<PathBuf> {
    match direction {
        Direction::Encrypt => {
            let mut name: OsString = input.as_os_str().to_owned();
            name.push(".");
            name.push(ENCRYPTED_EXTENSION);
            Ok(PathBuf::from(name))
        }
        Direction::Decrypt => {
            if input.extension().and_then(|e| e.to_str()) != Some(ENCRYPTED_EXTENSION) {
                return Err(SfError::InvalidExtension {
                    path: input.display().to_string(),
                    expected: ENCRYPTED_EXTENSION,
                });
            }
            Ok(input.with_extension(""))
        }
    }
}
