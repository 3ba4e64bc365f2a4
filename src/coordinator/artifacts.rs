//! Dump directory artifacts
//!
//! Layout of a dump under `<repl_root>/<dump_id>/`:
//!
//! ```text
//! _dumpmetadata                       descriptor, written last
//! _events                             incremental: JSON array of events
//! _external_tables_info               incremental manifest
//! <db>/<table>/_metadata              bootstrap: table snapshot
//! <db>/_external_tables_info          bootstrap manifest
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{normalize_name, TableSnapshot};
use crate::errors::{ReplError, ReplResult};
use crate::events::{EventId, ReplicationEvent};
use crate::fs::{self, FileSystem};
use crate::location::DataLocation;
use crate::manifest::MANIFEST_FILE_NAME;

/// Descriptor file name
pub const DUMP_METADATA_FILE: &str = "_dumpmetadata";

/// Incremental event file name
pub const EVENTS_FILE: &str = "_events";

/// Bootstrap table snapshot file name
pub const TABLE_METADATA_FILE: &str = "_metadata";

/// Current descriptor format
pub const FORMAT_VERSION: u8 = 1;

/// Bootstrap or incremental
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DumpKind {
    Bootstrap,
    Incremental,
}

impl DumpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DumpKind::Bootstrap => "bootstrap",
            DumpKind::Incremental => "incremental",
        }
    }
}

/// Contents of `_dumpmetadata`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpDescriptor {
    pub dump_id: Uuid,
    pub kind: DumpKind,
    /// Lowercase source database name
    pub database: String,
    /// Exclusive lower bound of the dumped range; `None` for bootstrap
    pub from: Option<EventId>,
    /// Watermark a replica reaches by loading this dump
    pub to: EventId,
    pub metadata_only: bool,
    pub include_external_tables: bool,
    /// Creation time, RFC3339
    pub created_at: String,
    pub format_version: u8,
}

impl DumpDescriptor {
    pub fn new(
        dump_id: Uuid,
        kind: DumpKind,
        database: &str,
        from: Option<EventId>,
        to: EventId,
    ) -> Self {
        Self {
            dump_id,
            kind,
            database: normalize_name(database),
            from,
            to,
            metadata_only: false,
            include_external_tables: false,
            created_at: Utc::now().to_rfc3339(),
            format_version: FORMAT_VERSION,
        }
    }

    pub fn to_json(&self) -> ReplResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ReplError::StorageWrite(format!("serialize dump descriptor: {}", e)))
    }

    /// Parses a descriptor, rejecting unknown format versions.
    pub fn from_json(json: &str) -> ReplResult<Self> {
        let descriptor: Self = serde_json::from_str(json)
            .map_err(|e| ReplError::manifest_format(format!("parse dump descriptor: {}", e)))?;
        if descriptor.format_version != FORMAT_VERSION {
            return Err(ReplError::manifest_format(format!(
                "unsupported dump format version {}",
                descriptor.format_version
            )));
        }
        Ok(descriptor)
    }

    /// Writes `_dumpmetadata` under `dump_root`.
    pub fn write(&self, fs: &dyn FileSystem, dump_root: &DataLocation) -> ReplResult<()> {
        let path = dump_root.join(DUMP_METADATA_FILE)?;
        fs::write_atomic(fs, &path, self.to_json()?.as_bytes())
    }

    /// Reads `_dumpmetadata` from `dump_root`.
    ///
    /// # Errors
    ///
    /// `StorageRead` when the file is missing (the dump is incomplete or
    /// does not exist), `ManifestFormat` when it cannot be parsed.
    pub fn read(fs: &dyn FileSystem, dump_root: &DataLocation) -> ReplResult<Self> {
        let path = dump_root.join(DUMP_METADATA_FILE)?;
        let bytes = fs
            .read(&path)
            .map_err(|e| e.into_read(&format!("read dump descriptor {}", path)))?;
        let json = String::from_utf8(bytes)
            .map_err(|e| ReplError::manifest_format(format!("dump descriptor is not UTF-8: {}", e)))?;
        Self::from_json(&json)
    }
}

/// Location of a table snapshot inside a bootstrap dump
pub fn table_metadata_path(
    dump_root: &DataLocation,
    database: &str,
    table: &str,
) -> ReplResult<DataLocation> {
    dump_root
        .join(&normalize_name(database))?
        .join(&normalize_name(table))?
        .join(TABLE_METADATA_FILE)
}

pub fn write_table_snapshot(
    fs: &dyn FileSystem,
    dump_root: &DataLocation,
    database: &str,
    snapshot: &TableSnapshot,
) -> ReplResult<()> {
    let path = table_metadata_path(dump_root, database, &snapshot.table.name)?;
    let json = serde_json::to_string_pretty(snapshot)
        .map_err(|e| ReplError::StorageWrite(format!("serialize {}: {}", path, e)))?;
    fs::write_atomic(fs, &path, json.as_bytes())
}

/// Reads every table snapshot of a bootstrap dump, sorted by table name.
pub fn read_table_snapshots(
    fs: &dyn FileSystem,
    dump_root: &DataLocation,
    database: &str,
) -> ReplResult<Vec<TableSnapshot>> {
    let db_dir = dump_root.join(&normalize_name(database))?;
    let children = match fs.list(&db_dir) {
        Ok(children) => children,
        Err(e) if e.is_not_found() => return Ok(Vec::new()),
        Err(e) => return Err(e.into_read(&format!("list {}", db_dir))),
    };

    let mut snapshots = Vec::new();
    for child in children {
        let dir_name = child.segments().last().unwrap_or_default();
        // the manifest file sits next to the table directories
        if dir_name == MANIFEST_FILE_NAME {
            continue;
        }
        let path = child.join(TABLE_METADATA_FILE)?;
        let bytes = fs::read_optional(fs, &path)?.ok_or_else(|| {
            ReplError::manifest_format(format!(
                "table directory {} has no {}, dump is incomplete",
                child, TABLE_METADATA_FILE
            ))
        })?;
        let snapshot: TableSnapshot = serde_json::from_slice(&bytes)
            .map_err(|e| ReplError::manifest_format(format!("parse {}: {}", path, e)))?;
        if snapshot.table.name != dir_name {
            return Err(ReplError::manifest_format(format!(
                "{} describes table {} but sits in directory {}",
                path, snapshot.table.name, dir_name
            )));
        }
        snapshots.push(snapshot);
    }
    snapshots.sort_by(|a, b| a.table.name.cmp(&b.table.name));
    Ok(snapshots)
}

pub fn write_events(
    fs: &dyn FileSystem,
    dump_root: &DataLocation,
    events: &[ReplicationEvent],
) -> ReplResult<()> {
    let path = dump_root.join(EVENTS_FILE)?;
    let json = serde_json::to_string_pretty(events)
        .map_err(|e| ReplError::StorageWrite(format!("serialize {}: {}", path, e)))?;
    fs::write_atomic(fs, &path, json.as_bytes())
}

pub fn read_events(fs: &dyn FileSystem, dump_root: &DataLocation) -> ReplResult<Vec<ReplicationEvent>> {
    let path = dump_root.join(EVENTS_FILE)?;
    let bytes = fs
        .read(&path)
        .map_err(|e| e.into_read(&format!("read {}", path)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ReplError::manifest_format(format!("parse {}: {}", path, e)))
}
