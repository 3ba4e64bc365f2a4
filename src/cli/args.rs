//! CLI argument definitions using clap
//!
//! Commands:
//! - tablerepl dump --config <path> --db <name> [--from <id>]
//! - tablerepl load --config <path> --db <name> --dump <location>
//! - tablerepl status --config <path> --db <name>
//! - tablerepl manifest --config <path> --dump <location> [--db <name>]

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// tablerepl - metadata replication for warehouse databases
#[derive(Parser, Debug)]
#[command(name = "tablerepl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log output format (logs go to stderr)
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Dump a database from the primary
    Dump {
        /// Path to configuration file
        #[arg(long, default_value = "./tablerepl.json")]
        config: PathBuf,

        /// Database to dump
        #[arg(long)]
        db: String,

        /// Watermark of the previous dump; omit for a bootstrap dump
        #[arg(long)]
        from: Option<u64>,
    },

    /// Load a dump into a replica database
    Load {
        /// Path to configuration file
        #[arg(long, default_value = "./tablerepl.json")]
        config: PathBuf,

        /// Target database on the replica
        #[arg(long)]
        db: String,

        /// Dump location printed by `dump`
        #[arg(long)]
        dump: String,
    },

    /// Show the last event applied to a replica database
    Status {
        /// Path to configuration file
        #[arg(long, default_value = "./tablerepl.json")]
        config: PathBuf,

        /// Replica database
        #[arg(long)]
        db: String,
    },

    /// Print the decoded external table manifest of a dump
    Manifest {
        /// Path to configuration file
        #[arg(long, default_value = "./tablerepl.json")]
        config: PathBuf,

        /// Dump location
        #[arg(long)]
        dump: String,

        /// Source database of a bootstrap dump; defaults to the dumped one
        #[arg(long)]
        db: Option<String>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
