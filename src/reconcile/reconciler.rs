//! Event application

use tracing::{debug, warn};

use super::Transition;
use crate::catalog::{validate_name, Partition, PartitionSpec, StagedCatalog, Table, TableKind};
use crate::errors::{ReplError, ReplResult};
use crate::events::{EventPayload, ReplicationEvent};
use crate::location::{DataLocation, Rebaser};
use crate::manifest::ManifestEntry;

/// Applies replication events and manifest entries to a staged catalog
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    rebaser: Rebaser,
}

impl Reconciler {
    /// Creates a reconciler that rebases external locations under `base`.
    pub fn new(base: Option<DataLocation>) -> Self {
        Self {
            rebaser: Rebaser::new(base),
        }
    }

    pub fn rebaser(&self) -> &Rebaser {
        &self.rebaser
    }

    /// Replica location for a primary location of a `kind` table.
    ///
    /// Managed data is copied into the replica's warehouse by the managed
    /// copy path, so managed locations are kept as they are.
    fn replica_location(&self, kind: TableKind, source: &DataLocation) -> DataLocation {
        match kind {
            TableKind::External => self.rebaser.apply(source),
            TableKind::Managed => source.clone(),
        }
    }

    /// Applies one event.
    ///
    /// # Errors
    ///
    /// Returns `ReplError::InconsistentReplicationState` when the event
    /// references an absent table or partition, a table of another kind, or
    /// a partition spec that does not match the table's keys, and when it
    /// creates a table whose name is not valid.
    pub fn apply(
        &self,
        catalog: &mut StagedCatalog<'_>,
        event: &ReplicationEvent,
    ) -> ReplResult<Transition> {
        let transition = match &event.payload {
            EventPayload::CreateTable { table } => self.create_table(catalog, table)?,
            EventPayload::DropTable { table, kind } => {
                match existing(catalog, table, *kind, event)? {
                    Some(_) => {
                        catalog.drop_table(table)?;
                        Transition::Dropped
                    }
                    None => Transition::Unchanged,
                }
            }
            EventPayload::AlterTableLocation {
                table,
                kind,
                location,
            } => {
                let mut current = required(catalog, table, *kind, event)?;
                let target = self.replica_location(*kind, location);
                if current.location == target {
                    Transition::Unchanged
                } else {
                    current.location = target;
                    catalog.put_table(current);
                    Transition::LocationUpdated
                }
            }
            EventPayload::AddPartition {
                table,
                kind,
                spec,
                location,
            } => {
                let current = required(catalog, table, *kind, event)?;
                check_spec(&current, spec, event)?;
                if catalog.partition(table, spec)?.is_some() {
                    Transition::Unchanged
                } else {
                    let target = match location {
                        Some(location) => self.replica_location(*kind, location),
                        None => current.default_partition_location(spec)?,
                    };
                    catalog.put_partition(table, Partition::new(spec.clone(), target));
                    Transition::Created
                }
            }
            EventPayload::DropPartition { table, kind, spec } => {
                let present = existing(catalog, table, *kind, event)?.is_some()
                    && catalog.partition(table, spec)?.is_some();
                if present {
                    catalog.drop_partition(table, spec);
                    Transition::Dropped
                } else {
                    Transition::Unchanged
                }
            }
            EventPayload::AlterPartitionLocation {
                table,
                kind,
                spec,
                location,
            } => {
                required(catalog, table, *kind, event)?;
                let mut partition = catalog.partition(table, spec)?.ok_or_else(|| {
                    ReplError::inconsistent(format!(
                        "event {}: {} on absent partition {}.{} ({})",
                        event.id,
                        event.payload.label(),
                        event.database,
                        table,
                        spec
                    ))
                })?;
                let target = self.replica_location(*kind, location);
                if partition.location == target {
                    Transition::Unchanged
                } else {
                    partition.location = target;
                    catalog.put_partition(table, partition);
                    Transition::LocationUpdated
                }
            }
            EventPayload::Insert { table, kind, spec } => {
                required(catalog, table, *kind, event)?;
                if let Some(spec) = spec {
                    if catalog.partition(table, spec)?.is_none() {
                        return Err(ReplError::inconsistent(format!(
                            "event {}: INSERT into absent partition {}.{} ({})",
                            event.id, event.database, table, spec
                        )));
                    }
                }
                Transition::Unchanged
            }
        };

        debug!(
            event_id = %event.id,
            event = event.payload.label(),
            table = event.payload.table_name(),
            transition = %transition,
            "applied event"
        );
        Ok(transition)
    }

    fn create_table(
        &self,
        catalog: &mut StagedCatalog<'_>,
        table: &Table,
    ) -> ReplResult<Transition> {
        validate_name(&table.name).map_err(|e| {
            ReplError::inconsistent(format!(
                "CREATE of table in {}: {}",
                catalog.database(),
                e
            ))
        })?;
        if let Some(current) = catalog.table(&table.name)? {
            if current.kind != table.kind {
                return Err(ReplError::inconsistent(format!(
                    "CREATE of {} table {}.{} over an existing {} table",
                    table.kind,
                    catalog.database(),
                    table.name,
                    current.kind
                )));
            }
            return Ok(Transition::Unchanged);
        }

        let mut replica = table.clone();
        replica.location = self.replica_location(table.kind, &table.location);
        catalog.put_table(replica);
        Ok(Transition::Created)
    }

    /// Confirms one manifest entry against the staged catalog.
    ///
    /// The table must be present and external. Its location is set to the
    /// rebased manifest location when the two differ.
    pub fn confirm_location(
        &self,
        catalog: &mut StagedCatalog<'_>,
        entry: &ManifestEntry,
    ) -> ReplResult<Transition> {
        let mut table = catalog.table(&entry.table)?.ok_or_else(|| {
            ReplError::inconsistent(format!(
                "manifest lists table {}.{} which is absent on the replica",
                catalog.database(),
                entry.table
            ))
        })?;
        if !table.is_external() {
            return Err(ReplError::inconsistent(format!(
                "manifest lists table {}.{} which is {} on the replica",
                catalog.database(),
                entry.table,
                table.kind
            )));
        }

        let expected = self.rebaser.apply(&entry.location);
        if table.location == expected {
            debug!(table = %entry.table, location = %expected, "manifest location confirmed");
            return Ok(Transition::Unchanged);
        }

        warn!(
            table = %entry.table,
            replica = %table.location,
            manifest = %expected,
            "replica location differs from manifest, correcting"
        );
        table.location = expected;
        catalog.put_table(table);
        Ok(Transition::LocationUpdated)
    }
}

/// Looks up the event's table, checking its kind when present.
fn existing(
    catalog: &StagedCatalog<'_>,
    table: &str,
    kind: TableKind,
    event: &ReplicationEvent,
) -> ReplResult<Option<Table>> {
    match catalog.table(table)? {
        Some(current) if current.kind != kind => Err(ReplError::inconsistent(format!(
            "event {}: {} for {} table {}.{} but the replica table is {}",
            event.id,
            event.payload.label(),
            kind,
            event.database,
            table,
            current.kind
        ))),
        other => Ok(other),
    }
}

/// Like `existing`, but an absent table is inconsistent.
fn required(
    catalog: &StagedCatalog<'_>,
    table: &str,
    kind: TableKind,
    event: &ReplicationEvent,
) -> ReplResult<Table> {
    existing(catalog, table, kind, event)?.ok_or_else(|| {
        ReplError::inconsistent(format!(
            "event {}: {} on absent table {}.{}",
            event.id,
            event.payload.label(),
            event.database,
            table
        ))
    })
}

fn check_spec(table: &Table, spec: &PartitionSpec, event: &ReplicationEvent) -> ReplResult<()> {
    if !table.is_partitioned() || !spec.matches_keys(&table.partition_keys) {
        return Err(ReplError::inconsistent(format!(
            "event {}: partition {} does not match the keys of {}.{}",
            event.id, spec, event.database, table.name
        )));
    }
    Ok(())
}
