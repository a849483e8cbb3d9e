pub mod config;
pub mod error;
pub mod paths;
pub mod size;

pub use config::SfConfig;
pub use error::{SfError, SfResult};
pub use paths::{derive_output_path, validate_input, Direction, ENCRYPTED_EXTENSION};
pub use size::format_size;
