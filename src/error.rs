//! Centralized error types for tnefshell.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the tnefshell library.
#[derive(Error, Debug)]
pub enum TnefError {
    /// The stream does not start with the TNEF signature. Nothing is decoded.
    #[error("Not a TNEF stream (signature 0x{signature:08x})")]
    NotTnefFormat { signature: u32 },

    /// An attribute header carries a level that is neither message nor attachment.
    #[error("Malformed attribute at offset {offset}: invalid level {level}")]
    MalformedAttribute { offset: u64, level: u8 },

    /// A read was requested past the end of the available bytes.
    #[error("Out of data: requested {requested} bytes, {available} available")]
    OutOfData { requested: usize, available: usize },

    /// The compressed RTF header disagrees with the payload length.
    #[error("RTF size mismatch: header declares {declared} bytes, payload has {actual}")]
    SizeMismatch { declared: u32, actual: usize },

    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// The enclosing mail message could not be parsed.
    #[error("Invalid mail message: {0}")]
    InvalidMessage(String),

    /// Writing an artifact failed.
    #[error("Export error: {0}")]
    ExportError(String),

    /// An invalid path was provided.
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Convenience alias for `Result<T, TnefError>`.
pub type Result<T> = std::result::Result<T, TnefError>;

impl TnefError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error aborts the whole stream rather than a single artifact.
    pub fn is_fatal_structural(&self) -> bool {
        matches!(
            self,
            Self::NotTnefFormat { .. } | Self::MalformedAttribute { .. }
        )
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (rare, prefer `TnefError::io`).
impl From<std::io::Error> for TnefError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
