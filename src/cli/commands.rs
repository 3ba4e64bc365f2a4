//! CLI command implementations
//!
//! Each command opens the file-backed collaborators named by the config,
//! runs one coordinator operation and prints its result.

use std::io;
use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};

use super::args::{Cli, Command};
use super::config::Config;
use super::errors::CliResult;
use super::io::write_outcome;
use super::logging::init_logging;
use crate::catalog::FileMetastore;
use crate::coordinator::{DumpDescriptor, DumpKind, ReplicationCoordinator};
use crate::events::{EventId, FileEventLog};
use crate::fs::LocalFileSystem;
use crate::location::DataLocation;
use crate::manifest::{self, ManifestReader};

/// Parses arguments, runs the command and prints the outcome.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    init_logging(cli.log_format);
    let result = run_command(cli.command);
    write_outcome(&mut io::stdout(), &result)?;
    result.map(|_| ())
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<Value> {
    match cmd {
        Command::Dump { config, db, from } => dump(&config, &db, from),
        Command::Load { config, db, dump } => load(&config, &db, &dump),
        Command::Status { config, db } => status(&config, &db),
        Command::Manifest { config, dump, db } => show_manifest(&config, &dump, db.as_deref()),
    }
}

fn coordinator(config: &Config) -> CliResult<ReplicationCoordinator> {
    let fs = Arc::new(LocalFileSystem::new(config.filesystem_path()));
    Ok(ReplicationCoordinator::new(fs, config.repl_root_location()?))
}

fn parse_location(raw: &str) -> CliResult<DataLocation> {
    Ok(DataLocation::parse(raw)?)
}

/// Dump a database from the primary
pub fn dump(config_path: &Path, db: &str, from: Option<u64>) -> CliResult<Value> {
    let config = Config::load(config_path)?;
    let options = config.to_options()?;
    let metastore = FileMetastore::open(&config.metastore_path())?;
    let events = FileEventLog::open(&config.metastore_path())?;

    let outcome = coordinator(&config)?.dump(&metastore, &events, db, from.map(EventId), &options)?;
    Ok(serde_json::to_value(outcome)?)
}

/// Load a dump into a replica database
pub fn load(config_path: &Path, db: &str, dump: &str) -> CliResult<Value> {
    let config = Config::load(config_path)?;
    let options = config.to_options()?;
    let metastore = FileMetastore::open(&config.metastore_path())?;

    let outcome =
        coordinator(&config)?.load_report(&metastore, db, &parse_location(dump)?, &options)?;
    Ok(serde_json::to_value(outcome)?)
}

/// Show the replication watermark of a database
pub fn status(config_path: &Path, db: &str) -> CliResult<Value> {
    let config = Config::load(config_path)?;
    let metastore = FileMetastore::open(&config.metastore_path())?;

    let watermark = coordinator(&config)?.status(&metastore, db)?;
    Ok(json!({
        "database": db.to_lowercase(),
        "last_replication_id": watermark.map(|w| w.value()),
    }))
}

/// Print the decoded manifest of a dump
pub fn show_manifest(config_path: &Path, dump: &str, db: Option<&str>) -> CliResult<Value> {
    let config = Config::load(config_path)?;
    let coordinator = coordinator(&config)?;
    let dump_root = parse_location(dump)?;

    let descriptor = DumpDescriptor::read(coordinator.fs(), &dump_root)?;
    let path = match descriptor.kind {
        DumpKind::Bootstrap => {
            manifest::bootstrap_manifest_path(&dump_root, db.unwrap_or(&descriptor.database))?
        }
        DumpKind::Incremental => manifest::incremental_manifest_path(&dump_root)?,
    };

    let entries = ManifestReader::new(coordinator.fs()).read(&path)?;
    let listed: Vec<Value> = entries
        .iter()
        .flatten()
        .map(|e| json!({"table": e.table, "location": e.location.to_string()}))
        .collect();
    Ok(json!({
        "dump_id": descriptor.dump_id,
        "kind": descriptor.kind.as_str(),
        "present": entries.is_some(),
        "entries": listed,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Column;
    use crate::warehouse::{TableDefinition, Warehouse};
    use std::fs;
    use tempfile::TempDir;

    struct Setup {
        _dir: TempDir,
        primary_config: std::path::PathBuf,
        replica_config: std::path::PathBuf,
    }

    fn setup() -> Setup {
        let dir = TempDir::new().unwrap();
        let fs_root = dir.path().join("fs");
        let write_config = |name: &str, metastore: &str| {
            let path = dir.path().join(name);
            let config = json!({
                "metastore_dir": dir.path().join(metastore).to_string_lossy(),
                "filesystem_root": fs_root.to_string_lossy(),
                "include_external_tables": true,
                "external_table_base_dir": "/replica_external_base",
            });
            fs::write(&path, config.to_string()).unwrap();
            path
        };
        let primary_config = write_config("primary.json", "primary");
        let replica_config = write_config("replica.json", "replica");

        let warehouse = Warehouse::new(
            Arc::new(FileMetastore::open(&dir.path().join("primary")).unwrap()),
            Arc::new(FileEventLog::open(&dir.path().join("primary")).unwrap()),
            Arc::new(LocalFileSystem::new(fs_root.clone())),
            DataLocation::parse("/warehouse").unwrap(),
        );
        warehouse.create_database("sales").unwrap();
        warehouse
            .create_table_as_select(
                "sales",
                TableDefinition::external("t1", vec![Column::new("id", "int")])
                    .located_at(DataLocation::parse("/ext/t1").unwrap()),
                &["1", "2"],
            )
            .unwrap();

        Setup {
            _dir: dir,
            primary_config,
            replica_config,
        }
    }

    #[test]
    fn test_dump_load_status_manifest() {
        let s = setup();
        let dumped = dump(&s.primary_config, "sales", None).unwrap();
        assert_eq!(dumped["kind"], "bootstrap");
        assert_eq!(dumped["last_replication_id"], 2);
        let location = dumped["dump_location"].as_str().unwrap().to_string();

        let listed = show_manifest(&s.primary_config, &location, None).unwrap();
        assert_eq!(listed["present"], true);
        assert_eq!(listed["entries"][0]["table"], "t1");
        assert_eq!(listed["entries"][0]["location"], "/ext/t1");

        let loaded = load(&s.replica_config, "replica", &location).unwrap();
        assert_eq!(loaded["watermark"], 2);

        let state = status(&s.replica_config, "replica").unwrap();
        assert_eq!(state["last_replication_id"], 2);
    }

    #[test]
    fn test_errors_carry_codes() {
        let s = setup();
        let err = dump(&s.primary_config, "missing", None).unwrap_err();
        assert_eq!(err.code(), "REPL_UNKNOWN_DATABASE");

        let err = status(&s.replica_config, "replica").unwrap_err();
        assert_eq!(err.code(), "REPL_UNKNOWN_DATABASE");

        let err = load(&s.replica_config, "replica", "/repl/nope").unwrap_err();
        assert_eq!(err.code(), "REPL_STORAGE_READ");

        let err = dump(Path::new("/nonexistent/config.json"), "sales", None).unwrap_err();
        assert_eq!(err.code(), "REPL_CLI_CONFIG_ERROR");
    }
}
