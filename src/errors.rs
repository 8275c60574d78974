// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::generator::GeneratorError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum SdaflowError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Job generation failed: {0}")]
    Generator(#[from] GeneratorError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SdaflowError>;

/// Process exit status for a command that failed with `err`.
///
/// Rejected configuration exits with 2, everything else (failed jobs,
/// store and I/O errors) with 1.
pub fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<SdaflowError>() {
        Some(SdaflowError::ConfigError(_) | SdaflowError::TomlError(_)) => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_exit_with_two() {
        let config = anyhow::Error::from(SdaflowError::ConfigError("bad".into()));
        assert_eq!(exit_status(&config), 2);

        let toml = toml::from_str::<toml::Table>("= nope").unwrap_err();
        assert_eq!(exit_status(&anyhow::Error::from(SdaflowError::from(toml))), 2);

        let io = SdaflowError::from(std::io::Error::other("disk"));
        assert_eq!(exit_status(&anyhow::Error::from(io)), 1);
        assert_eq!(exit_status(&anyhow::anyhow!("2 job(s) failed")), 1);
    }
}
