//! Dump/load cycle coordination
//!
//! A cycle is a dump on the primary followed by a load on the replica:
//!
//! 1. `dump` reads the latest event id `to`, writes the events (or, for a
//!    bootstrap, table snapshots) of `(from, to]` and the external table
//!    manifest under a fresh dump directory, then the descriptor.
//! 2. `load` reads the dump, applies it to a staged view of the target
//!    database, confirms the manifest locations and commits every change
//!    together with the new watermark.
//!
//! The watermark returned by a dump is the `from` of the next one. Loading
//! the same dump twice is a no-op, and a load either commits completely or
//! leaves the target untouched.

mod artifacts;
mod dump;
mod lease;
mod load;
mod options;

pub use artifacts::{
    read_events, read_table_snapshots, table_metadata_path, write_events, write_table_snapshot,
    DumpDescriptor, DumpKind, DUMP_METADATA_FILE, EVENTS_FILE, FORMAT_VERSION,
    TABLE_METADATA_FILE,
};
pub use dump::DumpOutcome;
pub use lease::{DatabaseLease, DatabaseLeases};
pub use load::LoadOutcome;
pub use options::ReplicationOptions;

use std::sync::Arc;

use crate::catalog::Metastore;
use crate::errors::{ReplError, ReplResult};
use crate::events::EventId;
use crate::fs::FileSystem;
use crate::location::DataLocation;

/// Runs dumps and loads against shared filesystem storage
#[derive(Debug, Clone)]
pub struct ReplicationCoordinator {
    fs: Arc<dyn FileSystem>,
    repl_root: DataLocation,
    dump_leases: DatabaseLeases,
    load_leases: DatabaseLeases,
}

impl ReplicationCoordinator {
    /// Creates a coordinator writing dumps under `repl_root`.
    pub fn new(fs: Arc<dyn FileSystem>, repl_root: DataLocation) -> Self {
        Self {
            fs,
            repl_root,
            dump_leases: DatabaseLeases::new(),
            load_leases: DatabaseLeases::new(),
        }
    }

    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    pub fn repl_root(&self) -> &DataLocation {
        &self.repl_root
    }

    pub fn dump_leases(&self) -> &DatabaseLeases {
        &self.dump_leases
    }

    pub fn load_leases(&self) -> &DatabaseLeases {
        &self.load_leases
    }

    /// Last event applied to a replica database, `None` if it has never
    /// loaded a dump.
    ///
    /// # Errors
    ///
    /// Returns `ReplError::UnknownDatabase` if the database does not exist.
    pub fn status(&self, target: &dyn Metastore, database: &str) -> ReplResult<Option<EventId>> {
        target
            .get_database(database)?
            .map(|db| db.watermark)
            .ok_or_else(|| ReplError::UnknownDatabase(database.to_string()))
    }
}
