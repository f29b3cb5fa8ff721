//! Common error types for tunebot

use thiserror::Error;

/// Common result type for tunebot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by tunebot crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input or constructor argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
