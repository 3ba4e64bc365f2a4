//! Replication error types
//!
//! Every failure surfaced by a dump or a load maps to one `ReplError` variant.
//! Collaborator failures are terminal for the current invocation; recovery
//! is a retry of the whole cycle from the last committed watermark.
//!
//! Error codes:
//! - REPL_ENCODING
//! - REPL_STORAGE_WRITE
//! - REPL_STORAGE_READ
//! - REPL_INCONSISTENT_STATE
//! - REPL_MANIFEST_FORMAT
//! - REPL_UNKNOWN_DATABASE
//! - REPL_CONFIG
//! - REPL_INVALID_OPERATION

use thiserror::Error;

/// Result type for replication operations
pub type ReplResult<T> = Result<T, ReplError>;

/// Replication errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReplError {
    /// A location could not be parsed or encoded
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// A metastore or filesystem write failed
    #[error("Storage write failed: {0}")]
    StorageWrite(String),

    /// A metastore or filesystem read failed
    #[error("Storage read failed: {0}")]
    StorageRead(String),

    /// An event references an object in an unexpected state
    #[error("Inconsistent replication state: {0}")]
    InconsistentReplicationState(String),

    /// A manifest or dump descriptor could not be parsed
    #[error("Malformed manifest: {0}")]
    ManifestFormat(String),

    /// The database does not exist on the source
    #[error("Unknown database: {0}")]
    UnknownDatabase(String),

    /// Invalid configuration or options
    #[error("Configuration error: {0}")]
    Config(String),

    /// A primary-side DDL/DML request that the catalog cannot satisfy
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl ReplError {
    /// Create an inconsistent state error.
    pub fn inconsistent(message: impl Into<String>) -> Self {
        ReplError::InconsistentReplicationState(message.into())
    }

    /// Create a manifest format error.
    pub fn manifest_format(message: impl Into<String>) -> Self {
        ReplError::ManifestFormat(message.into())
    }

    /// Create an encoding error.
    pub fn encoding(message: impl Into<String>) -> Self {
        ReplError::Encoding(message.into())
    }

    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            ReplError::Encoding(_) => "REPL_ENCODING",
            ReplError::StorageWrite(_) => "REPL_STORAGE_WRITE",
            ReplError::StorageRead(_) => "REPL_STORAGE_READ",
            ReplError::InconsistentReplicationState(_) => "REPL_INCONSISTENT_STATE",
            ReplError::ManifestFormat(_) => "REPL_MANIFEST_FORMAT",
            ReplError::UnknownDatabase(_) => "REPL_UNKNOWN_DATABASE",
            ReplError::Config(_) => "REPL_CONFIG",
            ReplError::InvalidOperation(_) => "REPL_INVALID_OPERATION",
        }
    }

    /// Check if this error needs operator investigation before a retry.
    ///
    /// Storage errors are retried by re-running the cycle; the rest will fail
    /// the same way again until the replica or the dump is repaired.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ReplError::InconsistentReplicationState(_)
                | ReplError::ManifestFormat(_)
                | ReplError::Encoding(_)
        )
    }
}
