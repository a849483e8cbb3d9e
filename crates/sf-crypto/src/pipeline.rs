//! Whole-file encrypt/decrypt operations
//!
//! One call handles one file from start to finish:
//!
//! ```text
//! Start → HeaderWritten | HeaderValidated → ChunkProcessed* → Complete
//!   └──────────────── any step ────────────────→ Failed
//! ```
//!
//! Each call derives its own KEK and owns its own DEK and nonce sequence, so
//! independent calls can run on separate threads without coordination.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use secrecy::SecretString;
use tracing::{debug, info, warn};

use crate::error::{CryptoError, CryptoResult};
use crate::header::{FileHeader, HEADER_SIZE};
use crate::kdf::{derive_kek, KdfParams};
use crate::keys::{generate_data_key, DataKey};
use crate::rng::random_array;
use crate::stream::{decrypt_body, encrypt_body};
use crate::NONCE_SIZE;

/// Result of a completed file operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// Plaintext bytes processed
    pub bytes: u64,
    pub elapsed: Duration,
}

/// Last state reached before a failure. Used for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Start,
    HeaderWritten,
    HeaderValidated,
}

fn failed(op: &'static str, stage: Stage) -> impl FnOnce(CryptoError) -> CryptoError {
    move |e| {
        warn!(op, stage = ?stage, error = %e, "operation failed");
        e
    }
}

/// Encrypts and decrypts files with a fixed set of KDF parameters.
///
/// `FileCipher::default()` uses the parameters the file format is defined
/// with; anything else produces files only readable with the same params.
#[derive(Debug, Clone, Default)]
pub struct FileCipher {
    params: KdfParams,
}

impl FileCipher {
    pub fn new(params: KdfParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &KdfParams {
        &self.params
    }

    /// Encrypt `reader` into `writer`: header first, then sealed chunks.
    ///
    /// Returns the number of plaintext bytes consumed.
    pub fn encrypt_stream<R: Read, W: Write>(
        &self,
        reader: &mut R,
        writer: &mut W,
        password: &SecretString,
    ) -> CryptoResult<u64> {
        let fail = || failed("encrypt", Stage::Start);

        let (salt, kek) = derive_kek(password, None, &self.params).map_err(fail())?;
        let dek = generate_data_key().map_err(fail())?;
        let nonce: [u8; NONCE_SIZE] = random_array().map_err(fail())?;

        let header = FileHeader::seal(&kek, &dek, nonce, salt).map_err(fail())?;
        drop(kek);
        header.write_to(writer).map_err(fail())?;
        debug!("header written");

        encrypt_body(&dek, nonce, reader, writer).map_err(failed("encrypt", Stage::HeaderWritten))
    }

    /// Decrypt `reader` into `writer`. The header is read and the DEK
    /// unwrapped before any body byte is read.
    pub fn decrypt_stream<R: Read, W: Write>(
        &self,
        reader: &mut R,
        writer: &mut W,
        password: &SecretString,
    ) -> CryptoResult<u64> {
        let (header, dek) = self.open_header(reader, password)?;
        decrypt_body(&dek, header.nonce, reader, writer)
            .map_err(failed("decrypt", Stage::HeaderValidated))
    }

    /// Encrypt the file at `input` into a newly created file at `output`.
    ///
    /// Fails with [`CryptoError::OutputExists`] rather than overwrite.
    pub fn encrypt_file(
        &self,
        input: &Path,
        output: &Path,
        password: &SecretString,
    ) -> CryptoResult<Outcome> {
        let start = Instant::now();

        let mut reader = BufReader::new(open_input(input)?);
        let mut writer = BufWriter::new(create_output(output)?);

        let bytes = self.encrypt_stream(&mut reader, &mut writer, password)?;
        writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;

        let outcome = Outcome {
            bytes,
            elapsed: start.elapsed(),
        };
        info!(
            input = %input.display(),
            output = %output.display(),
            bytes,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "file encrypted"
        );
        Ok(outcome)
    }

    /// Decrypt the file at `input` into a newly created file at `output`.
    ///
    /// Inputs shorter than [`HEADER_SIZE`] are rejected before the password
    /// is used. The output file is only created once the header has been
    /// validated and the DEK recovered.
    pub fn decrypt_file(
        &self,
        input: &Path,
        output: &Path,
        password: &SecretString,
    ) -> CryptoResult<Outcome> {
        let start = Instant::now();

        let file = open_input(input)?;
        let size = file.metadata()?.len();
        if size < HEADER_SIZE as u64 {
            return Err(failed("decrypt", Stage::Start)(CryptoError::Format(format!(
                "file too short: {size} bytes (minimum {HEADER_SIZE})"
            ))));
        }

        let mut reader = BufReader::new(file);
        let (header, dek) = self.open_header(&mut reader, password)?;

        let mut writer = BufWriter::new(create_output(output)?);
        let bytes = decrypt_body(&dek, header.nonce, &mut reader, &mut writer)
            .map_err(failed("decrypt", Stage::HeaderValidated))?;
        drop(dek);
        writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;

        let outcome = Outcome {
            bytes,
            elapsed: start.elapsed(),
        };
        info!(
            input = %input.display(),
            output = %output.display(),
            bytes,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "file decrypted"
        );
        Ok(outcome)
    }

    /// Read the header and unwrap its DEK with the password-derived KEK.
    fn open_header<R: Read>(
        &self,
        reader: &mut R,
        password: &SecretString,
    ) -> CryptoResult<(FileHeader, DataKey)> {
        let header = FileHeader::read_from(reader).map_err(failed("decrypt", Stage::Start))?;
        let dek = header
            .open(password, &self.params)
            .map_err(failed("decrypt", Stage::Start))?;
        debug!("header validated");
        Ok((header, dek))
    }
}

/// Encrypt `input` to `output` with the format's default KDF parameters.
pub fn encrypt_file(input: &Path, output: &Path, password: &SecretString) -> CryptoResult<Outcome> {
    FileCipher::default().encrypt_file(input, output, password)
}

/// Decrypt `input` to `output` with the format's default KDF parameters.
pub fn decrypt_file(input: &Path, output: &Path, password: &SecretString) -> CryptoResult<Outcome> {
    FileCipher::default().decrypt_file(input, output, password)
}

fn open_input(path: &Path) -> CryptoResult<File> {
    let meta = std::fs::metadata(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => CryptoError::Input(format!("{} does not exist", path.display())),
        _ => CryptoError::Input(format!("could not read {}: {e}", path.display())),
    })?;
    if meta.is_dir() {
        return Err(CryptoError::Input(format!(
            "{} is a directory",
            path.display()
        )));
    }
    File::open(path)
        .map_err(|e| CryptoError::Input(format!("could not open {}: {e}", path.display())))
}

fn create_output(path: &Path) -> CryptoResult<File> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => CryptoError::OutputExists(path.display().to_string()),
            _ => CryptoError::Io(e),
        })
}
