//! Error types for lidarlod

use thiserror::Error;

/// Main error type for lidarlod operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Unsupported file version {version} (up to {max} supported)")]
    UnsupportedVersion { version: u16, max: u16 },

    #[error("Unsupported point format id: {0}")]
    UnsupportedFormat(u8),

    #[error("Point index {index} out of range for a batch of {count} points")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("Invalid dataset: {points} points cannot seed {k} clusters")]
    InvalidDataset { points: usize, k: usize },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for lidarlod operations
pub type Result<T> = std::result::Result<T, Error>;
