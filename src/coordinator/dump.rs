//! Dump side of a cycle

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::artifacts::{self, DumpDescriptor, DumpKind};
use super::options::ReplicationOptions;
use super::ReplicationCoordinator;
use crate::catalog::{normalize_name, Metastore, TableKind, TableSnapshot};
use crate::errors::{ReplError, ReplResult};
use crate::events::{EventId, EventStore, ReplicationEvent};
use crate::location::DataLocation;
use crate::manifest::{self, ManifestWriter};

/// Snapshot attempts before a bootstrap gives up on a moving catalog
const SNAPSHOT_ATTEMPTS: usize = 3;

/// Result of a dump
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DumpOutcome {
    /// Root directory of the dump
    pub dump_location: DataLocation,
    /// Watermark to pass as `from` to the next dump
    pub last_replication_id: EventId,
    pub kind: DumpKind,
    /// Records in the external table manifest, 0 when none was written
    pub manifest_entries: usize,
}

impl ReplicationCoordinator {
    /// Dumps `database` from the primary's metastore and event log.
    ///
    /// `from = None` takes a bootstrap dump; otherwise the dump holds the
    /// events after `from`.
    ///
    /// # Errors
    ///
    /// - `UnknownDatabase` if the database does not exist
    /// - `InconsistentReplicationState` if `from` is ahead of the event log
    /// - `StorageRead` if a bootstrap snapshot keeps racing with writers
    /// - `StorageRead`/`StorageWrite` on collaborator failures
    ///
    /// The dump directory is removed on any failure.
    pub fn dump(
        &self,
        metastore: &dyn Metastore,
        events: &dyn EventStore,
        database: &str,
        from: Option<EventId>,
        options: &ReplicationOptions,
    ) -> ReplResult<DumpOutcome> {
        let database = normalize_name(database);
        let _lease = self.dump_leases.acquire(&database);

        if metastore.get_database(&database)?.is_none() {
            return Err(ReplError::UnknownDatabase(database));
        }

        let dump_id = Uuid::new_v4();
        let dump_root = self.repl_root.join(&dump_id.to_string())?;

        let result = match from {
            None => self.write_bootstrap(metastore, events, &database, dump_id, &dump_root, options),
            Some(from) => {
                self.write_incremental(events, &database, from, dump_id, &dump_root, options)
            }
        };

        match result {
            Ok(outcome) => {
                info!(
                    database = %database,
                    kind = outcome.kind.as_str(),
                    from = ?from.map(|f| f.value()),
                    to = outcome.last_replication_id.value(),
                    manifest_entries = outcome.manifest_entries,
                    dump = %outcome.dump_location,
                    "dump complete"
                );
                Ok(outcome)
            }
            Err(e) => {
                self.discard(&dump_root);
                warn!(database = %database, error = %e, code = e.code(), "dump failed");
                Err(e)
            }
        }
    }

    fn discard(&self, dump_root: &DataLocation) {
        match self.fs.delete(dump_root, true) {
            Ok(()) => debug!(dump = %dump_root, "removed partial dump"),
            Err(e) if e.is_not_found() => {}
            Err(e) => warn!(dump = %dump_root, error = %e, "failed to remove partial dump"),
        }
    }

    /// Reads the table snapshots of `database` consistent with watermark
    /// `to`, retrying while events are appended during the read.
    ///
    /// A snapshot holding changes newer than `to` cannot be replayed onto.
    /// Running out of attempts fails the dump with a retryable error.
    fn snapshot_tables(
        metastore: &dyn Metastore,
        events: &dyn EventStore,
        database: &str,
        options: &ReplicationOptions,
    ) -> ReplResult<(EventId, Vec<TableSnapshot>)> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let to = events.latest()?;
            let mut snapshots = Vec::new();
            for table in metastore.list_tables(database)? {
                if table.is_external() && !options.include_external_tables {
                    continue;
                }
                let partitions = metastore.list_partitions(database, &table.name)?;
                snapshots.push(TableSnapshot { table, partitions });
            }

            let after = events.latest()?;
            if after == to {
                return Ok((to, snapshots));
            }
            if attempt >= SNAPSHOT_ATTEMPTS {
                return Err(ReplError::StorageRead(format!(
                    "catalog of {} kept changing during bootstrap snapshot ({} attempts, last read events {} to {})",
                    database, attempt, to, after
                )));
            }
            debug!(database = %database, attempt, "catalog changed during snapshot, retrying");
        }
    }

    fn write_bootstrap(
        &self,
        metastore: &dyn Metastore,
        events: &dyn EventStore,
        database: &str,
        dump_id: Uuid,
        dump_root: &DataLocation,
        options: &ReplicationOptions,
    ) -> ReplResult<DumpOutcome> {
        let (to, snapshots) = Self::snapshot_tables(metastore, events, database, options)?;

        self.fs
            .create_dir_all(dump_root)
            .map_err(|e| e.into_write(&format!("create dump directory {}", dump_root)))?;

        for snapshot in &snapshots {
            artifacts::write_table_snapshot(self.fs(), dump_root, database, snapshot)?;
        }

        let manifest_entries = if options.include_external_tables {
            let entries = manifest::bootstrap_entries(&snapshots)?;
            let path = manifest::bootstrap_manifest_path(dump_root, database)?;
            ManifestWriter::new(self.fs()).write(&path, entries)?
        } else {
            0
        };

        let descriptor = self.descriptor(dump_id, DumpKind::Bootstrap, database, None, to, options);
        descriptor.write(self.fs(), dump_root)?;

        debug!(database = %database, tables = snapshots.len(), "bootstrap dump written");
        Ok(DumpOutcome {
            dump_location: dump_root.clone(),
            last_replication_id: to,
            kind: DumpKind::Bootstrap,
            manifest_entries,
        })
    }

    fn write_incremental(
        &self,
        events: &dyn EventStore,
        database: &str,
        from: EventId,
        dump_id: Uuid,
        dump_root: &DataLocation,
        options: &ReplicationOptions,
    ) -> ReplResult<DumpOutcome> {
        let to = events.latest()?;
        if from > to {
            return Err(ReplError::inconsistent(format!(
                "dump of {} requested from event {} but the log ends at {}",
                database, from, to
            )));
        }

        let range: Vec<ReplicationEvent> = events
            .read_range(database, Some(from), Some(to))?
            .into_iter()
            .filter(|e| {
                options.include_external_tables || e.payload.table_kind() != TableKind::External
            })
            .collect();
        let dumped: Vec<ReplicationEvent> = range
            .iter()
            .filter(|e| !(options.metadata_only && e.payload.is_dml()))
            .cloned()
            .collect();

        self.fs
            .create_dir_all(dump_root)
            .map_err(|e| e.into_write(&format!("create dump directory {}", dump_root)))?;
        artifacts::write_events(self.fs(), dump_root, &dumped)?;

        let manifest_entries = if options.include_external_tables {
            let history = events.read_range(database, None, Some(to))?;
            let entries = manifest::incremental_entries(options.manifest_scope, &history, &range)?;
            let path = manifest::incremental_manifest_path(dump_root)?;
            ManifestWriter::new(self.fs()).write(&path, entries)?
        } else {
            0
        };

        let descriptor = self.descriptor(
            dump_id,
            DumpKind::Incremental,
            database,
            Some(from),
            to,
            options,
        );
        descriptor.write(self.fs(), dump_root)?;

        debug!(
            database = %database,
            events = dumped.len(),
            skipped = range.len() - dumped.len(),
            "incremental dump written"
        );
        Ok(DumpOutcome {
            dump_location: dump_root.clone(),
            last_replication_id: to,
            kind: DumpKind::Incremental,
            manifest_entries,
        })
    }

    fn descriptor(
        &self,
        dump_id: Uuid,
        kind: DumpKind,
        database: &str,
        from: Option<EventId>,
        to: EventId,
        options: &ReplicationOptions,
    ) -> DumpDescriptor {
        let mut descriptor = DumpDescriptor::new(dump_id, kind, database, from, to);
        descriptor.metadata_only = options.metadata_only;
        descriptor.include_external_tables = options.include_external_tables;
        descriptor
    }
}
