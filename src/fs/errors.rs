//! Filesystem collaborator errors

use thiserror::Error;

use crate::errors::ReplError;

/// Result type for filesystem operations
pub type FsResult<T> = Result<T, FsError>;

/// Filesystem errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FsError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl FsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound(_))
    }

    /// Maps into a `StorageRead` error with call-site context.
    pub fn into_read(self, context: &str) -> ReplError {
        ReplError::StorageRead(format!("{}: {}", context, self))
    }

    /// Maps into a `StorageWrite` error with call-site context.
    pub fn into_write(self, context: &str) -> ReplError {
        ReplError::StorageWrite(format!("{}: {}", context, self))
    }
}

impl From<std::io::Error> for FsError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            FsError::NotFound(e.to_string())
        } else {
            FsError::Io(e.to_string())
        }
    }
}
