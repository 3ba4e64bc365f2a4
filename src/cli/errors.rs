//! CLI-specific error types
//!
//! All CLI errors are fatal: the command prints the code and exits non-zero.

use std::io;

use thiserror::Error;

use crate::errors::ReplError;

/// CLI error
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration file error
    #[error("{0}")]
    Config(String),

    /// I/O error (stdout)
    #[error("{0}")]
    Io(String),

    /// Replication failure
    #[error(transparent)]
    Repl(#[from] ReplError),
}

impl CliError {
    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        CliError::Config(msg.into())
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        CliError::Io(msg.into())
    }

    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            CliError::Config(_) => "REPL_CLI_CONFIG_ERROR",
            CliError::Io(_) => "REPL_CLI_IO_ERROR",
            CliError::Repl(e) => e.code(),
        }
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
