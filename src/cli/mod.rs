//! CLI module for tablerepl
//!
//! Provides command-line interface for:
//! - dump: Dump a primary database
//! - load: Load a dump into a replica database
//! - status: Show a replica's last applied event
//! - manifest: Print a dump's external table manifest

mod args;
mod commands;
mod config;
mod errors;
mod io;
mod logging;

pub use args::{Cli, Command, LogFormat};
pub use commands::{dump, load, run, run_command, show_manifest, status};
pub use config::Config;
pub use errors::{CliError, CliResult};
pub use io::write_outcome;
pub use logging::init_logging;
