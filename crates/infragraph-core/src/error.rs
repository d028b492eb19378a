use thiserror::Error;

/// Core error type shared across infragraph crates.
#[derive(Debug, Error)]
pub enum Error {
    /// Scale parameters are invalid or inconsistent.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Failed to read a configuration file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Configuration file could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),
}

/// Convenience alias for results returned by infragraph crates.
pub type Result<T> = std::result::Result<T, Error>;
