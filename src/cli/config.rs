//! Configuration file
//!
//! ```json
//! {
//!   "metastore_dir": "/var/lib/tablerepl/replica",
//!   "filesystem_root": "/mnt/warehouse",
//!   "repl_root": "/repl",
//!   "include_external_tables": true,
//!   "external_table_base_dir": "/replica_external_base",
//!   "metadata_only": false,
//!   "manifest_scope": "live_tables"
//! }
//! ```
//!
//! `metastore_dir` holds `catalog.json` and `events.jsonl`. Locations are
//! resolved under `filesystem_root`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::{CliError, CliResult};
use crate::coordinator::ReplicationOptions;
use crate::location::DataLocation;
use crate::manifest::ManifestScope;

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Metastore and event log directory (required)
    pub metastore_dir: String,

    /// Local directory backing the filesystem (required)
    pub filesystem_root: String,

    /// Dump root location (optional, default "/repl")
    #[serde(default = "default_repl_root")]
    pub repl_root: String,

    /// Replicate external tables (optional, default false)
    #[serde(default)]
    pub include_external_tables: bool,

    /// Replica base directory for external table locations
    #[serde(default)]
    pub external_table_base_dir: Option<String>,

    /// Leave DML events out of dumps (optional, default false)
    #[serde(default)]
    pub metadata_only: bool,

    /// Incremental manifest policy (optional, default "live_tables")
    #[serde(default)]
    pub manifest_scope: ManifestScope,
}

fn default_repl_root() -> String {
    "/repl".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> CliResult<Self> {
        let config: Config = serde_json::from_str(content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.metastore_dir.trim().is_empty() {
            return Err(CliError::config_error("metastore_dir must not be empty"));
        }
        if self.filesystem_root.trim().is_empty() {
            return Err(CliError::config_error("filesystem_root must not be empty"));
        }
        self.repl_root_location()?;
        self.to_options()?;
        Ok(())
    }

    pub fn metastore_path(&self) -> PathBuf {
        PathBuf::from(&self.metastore_dir)
    }

    pub fn filesystem_path(&self) -> PathBuf {
        PathBuf::from(&self.filesystem_root)
    }

    pub fn repl_root_location(&self) -> CliResult<DataLocation> {
        DataLocation::parse(&self.repl_root)
            .map_err(|e| CliError::config_error(format!("Invalid repl_root: {}", e)))
    }

    /// Replication options for dumps and loads.
    pub fn to_options(&self) -> CliResult<ReplicationOptions> {
        let base = self
            .external_table_base_dir
            .as_deref()
            .map(DataLocation::parse)
            .transpose()
            .map_err(|e| {
                CliError::config_error(format!("Invalid external_table_base_dir: {}", e))
            })?;

        Ok(ReplicationOptions {
            include_external_tables: self.include_external_tables,
            external_table_base_directory: base,
            metadata_only: self.metadata_only,
            manifest_scope: self.manifest_scope,
        })
    }
}
