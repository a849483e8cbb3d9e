use thiserror::Error;

pub type SfResult<T> = Result<T, SfError>;

#[derive(Debug, Error)]
pub enum SfError {
    #[error("input file not found: {0}")]
    NotFound(String),

    #[error("input cannot be a directory: {0}")]
    IsDirectory(String),

    #[error("the input file extension is invalid: expected .{expected}, got {path}")]
    InvalidExtension { path: String, expected: &'static str },

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
