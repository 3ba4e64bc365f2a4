//! Load side of a cycle

use serde::Serialize;
use tracing::{debug, info, warn};

use super::artifacts::{self, DumpDescriptor, DumpKind};
use super::options::ReplicationOptions;
use super::ReplicationCoordinator;
use crate::catalog::{normalize_name, Metastore, StagedCatalog, TableSnapshot};
use crate::errors::{ReplError, ReplResult};
use crate::events::{EventId, EventPayload, ReplicationEvent};
use crate::location::DataLocation;
use crate::manifest::{self, ManifestReader};
use crate::reconcile::{Reconciler, Transition};

/// Result of a load
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadOutcome {
    /// Lowercase target database name
    pub database: String,
    /// Watermark committed with the load
    pub watermark: EventId,
    /// Events that changed the catalog
    pub changed: usize,
    /// Events already reflected in the catalog or below the watermark
    pub unchanged: usize,
    /// Manifest records confirmed
    pub manifest_entries: usize,
    /// Table locations corrected from the manifest
    pub corrected_locations: usize,
}

impl LoadOutcome {
    fn record(&mut self, transition: Transition) {
        if transition.is_change() {
            self.changed += 1;
        } else {
            self.unchanged += 1;
        }
    }
}

impl ReplicationCoordinator {
    /// Loads a dump into `database` of the replica metastore and returns the
    /// committed watermark.
    ///
    /// # Errors
    ///
    /// - `StorageRead` if the dump is missing or incomplete
    /// - `ManifestFormat` if the descriptor, events or manifest are corrupt
    /// - `InconsistentReplicationState` if the dump does not follow the
    ///   target's watermark or references objects the target cannot have
    ///
    /// On error nothing is committed to `target`.
    pub fn load(
        &self,
        target: &dyn Metastore,
        database: &str,
        dump_location: &DataLocation,
        options: &ReplicationOptions,
    ) -> ReplResult<EventId> {
        self.load_report(target, database, dump_location, options)
            .map(|outcome| outcome.watermark)
    }

    /// Like `load`, returning what the load did.
    pub fn load_report(
        &self,
        target: &dyn Metastore,
        database: &str,
        dump_location: &DataLocation,
        options: &ReplicationOptions,
    ) -> ReplResult<LoadOutcome> {
        let database = normalize_name(database);
        let _lease = self.load_leases.acquire(&database);

        let result = self.apply_dump(target, &database, dump_location, options);
        match &result {
            Ok(outcome) => info!(
                database = %database,
                dump = %dump_location,
                watermark = outcome.watermark.value(),
                changed = outcome.changed,
                unchanged = outcome.unchanged,
                manifest_entries = outcome.manifest_entries,
                "load complete"
            ),
            Err(e) => warn!(
                database = %database,
                dump = %dump_location,
                error = %e,
                code = e.code(),
                "load failed, target unchanged"
            ),
        }
        result
    }

    fn apply_dump(
        &self,
        target: &dyn Metastore,
        database: &str,
        dump_location: &DataLocation,
        options: &ReplicationOptions,
    ) -> ReplResult<LoadOutcome> {
        let descriptor = DumpDescriptor::read(self.fs(), dump_location)?;
        let watermark = target.get_database(database)?.map(|db| db.watermark);
        let reconciler = Reconciler::new(options.external_table_base_directory.clone());
        let mut staged = StagedCatalog::open(target, database)?;
        let mut outcome = LoadOutcome {
            database: database.to_string(),
            ..LoadOutcome::default()
        };

        let (current, manifest_path) = match descriptor.kind {
            DumpKind::Bootstrap => {
                let current = check_bootstrap(&descriptor, database, watermark)?;
                staged.ensure_database();
                let snapshots =
                    artifacts::read_table_snapshots(self.fs(), dump_location, &descriptor.database)?;
                for event in snapshot_events(&descriptor, snapshots) {
                    outcome.record(reconciler.apply(&mut staged, &event)?);
                }
                (
                    current,
                    manifest::bootstrap_manifest_path(dump_location, &descriptor.database)?,
                )
            }
            DumpKind::Incremental => {
                let current = check_incremental(&descriptor, database, watermark)?;
                for event in artifacts::read_events(self.fs(), dump_location)? {
                    if event.id <= current {
                        debug!(event_id = %event.id, "event below watermark, skipped");
                        outcome.unchanged += 1;
                        continue;
                    }
                    outcome.record(reconciler.apply(&mut staged, &event)?);
                }
                (current, manifest::incremental_manifest_path(dump_location)?)
            }
        };

        // an older dump's manifest would revert newer locations
        if descriptor.to < current {
            debug!(dump_to = %descriptor.to, watermark = %current, "stale dump, manifest skipped");
        } else if let Some(entries) = ManifestReader::new(self.fs()).read(&manifest_path)? {
            for entry in &entries {
                if reconciler.confirm_location(&mut staged, entry)? == Transition::LocationUpdated {
                    outcome.corrected_locations += 1;
                }
            }
            outcome.manifest_entries = entries.len();
        }

        let next = current.max(descriptor.to);
        staged.set_watermark(next);
        target.commit(staged.into_batch())?;
        outcome.watermark = next;
        Ok(outcome)
    }
}

/// Returns the watermark a bootstrap load starts from.
fn check_bootstrap(
    descriptor: &DumpDescriptor,
    database: &str,
    watermark: Option<Option<EventId>>,
) -> ReplResult<EventId> {
    match watermark {
        None | Some(None) => Ok(EventId::ZERO),
        Some(Some(w)) if w == descriptor.to => Ok(w),
        Some(Some(w)) => Err(ReplError::inconsistent(format!(
            "bootstrap dump at event {} cannot be loaded into {} which is at event {}",
            descriptor.to, database, w
        ))),
    }
}

/// Returns the watermark an incremental load starts from.
fn check_incremental(
    descriptor: &DumpDescriptor,
    database: &str,
    watermark: Option<Option<EventId>>,
) -> ReplResult<EventId> {
    let current = match watermark {
        Some(Some(w)) => w,
        Some(None) => {
            return Err(ReplError::inconsistent(format!(
                "incremental dump cannot be loaded into {} which has never been bootstrapped",
                database
            )))
        }
        None => {
            return Err(ReplError::inconsistent(format!(
                "incremental dump cannot be loaded into missing database {}",
                database
            )))
        }
    };

    let from = descriptor.from.unwrap_or(EventId::ZERO);
    if from > current {
        return Err(ReplError::inconsistent(format!(
            "dump starts after event {} but {} is at event {}",
            from, database, current
        )));
    }
    Ok(current)
}

/// Bootstrap snapshots as the events that would have created them.
fn snapshot_events(
    descriptor: &DumpDescriptor,
    snapshots: Vec<TableSnapshot>,
) -> Vec<ReplicationEvent> {
    let mut events = Vec::new();
    for snapshot in snapshots {
        let name = snapshot.table.name.clone();
        let kind = snapshot.table.kind;
        events.push(ReplicationEvent::new(
            descriptor.to,
            &descriptor.database,
            EventPayload::CreateTable {
                table: snapshot.table,
            },
        ));
        for partition in snapshot.partitions {
            events.push(ReplicationEvent::new(
                descriptor.to,
                &descriptor.database,
                EventPayload::AddPartition {
                    table: name.clone(),
                    kind,
                    spec: partition.spec,
                    location: Some(partition.location),
                },
            ));
        }
    }
    events
}
