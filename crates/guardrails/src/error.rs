//! Guardrail error types.

use thiserror::Error;

/// Guardrail errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Input was rejected outright. The message is user-presentable.
    #[error("{0}")]
    Blocked(String),

    /// Failed to parse a guardrail config file.
    #[error("failed to parse guardrail config: {0}")]
    Parse(String),

    /// An I/O error occurred while reading config.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
