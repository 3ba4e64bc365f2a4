//! Shared harness for replication integration tests
//!
//! A `Cluster` is a primary warehouse and a replica metastore sharing one
//! in-memory filesystem, with a coordinator dumping under `/repl`.

#![allow(dead_code)]

use std::sync::Arc;

use tablerepl::catalog::{Column, MemoryMetastore, Metastore, Partition, PartitionSpec, Table};
use tablerepl::coordinator::{DumpOutcome, ReplicationCoordinator, ReplicationOptions};
use tablerepl::events::{EventId, MemoryEventLog};
use tablerepl::fs::{FileSystem, MemoryFileSystem};
use tablerepl::location::DataLocation;
use tablerepl::manifest::ManifestReader;
use tablerepl::warehouse::{TableDefinition, Warehouse};
use tablerepl::ReplResult;

pub const PRIMARY_DB: &str = "primary_db";
pub const REPLICA_DB: &str = "replica_db";
pub const REPLICA_EXTERNAL_BASE: &str = "/replica_external_base";

pub fn loc(raw: &str) -> DataLocation {
    DataLocation::parse(raw).unwrap()
}

pub fn country(value: &str) -> PartitionSpec {
    PartitionSpec::single("country", value)
}

/// External replication on, locations rebased under the replica base.
pub fn with_external() -> ReplicationOptions {
    ReplicationOptions::with_external_tables(Some(loc(REPLICA_EXTERNAL_BASE)))
}

/// External replication on, locations kept verbatim.
pub fn with_external_unrebased() -> ReplicationOptions {
    ReplicationOptions::with_external_tables(None)
}

pub fn without_external() -> ReplicationOptions {
    ReplicationOptions::new()
}

/// `t1`: unpartitioned external table at `/ext/t1`
pub fn t1() -> TableDefinition {
    TableDefinition::external("t1", vec![Column::new("id", "int")]).located_at(loc("/ext/t1"))
}

/// `t2`: external table at `/ext/t2` partitioned by `country`
pub fn t2() -> TableDefinition {
    TableDefinition::external("t2", vec![Column::new("place", "string")])
        .partitioned_by(vec![Column::new("country", "string")])
        .located_at(loc("/ext/t2"))
}

/// Replica catalog contents, for convergence comparisons
pub type CatalogImage = Vec<(Table, Vec<Partition>)>;

pub fn catalog_image(store: &dyn Metastore, database: &str) -> CatalogImage {
    store
        .list_tables(database)
        .unwrap()
        .into_iter()
        .map(|t| {
            let partitions = store.list_partitions(database, &t.name).unwrap();
            (t, partitions)
        })
        .collect()
}

pub struct Cluster {
    pub fs: Arc<MemoryFileSystem>,
    pub events: Arc<MemoryEventLog>,
    pub primary: Warehouse,
    pub replica: Arc<MemoryMetastore>,
    /// Reads replica tables through the replica metastore
    pub replica_view: Warehouse,
    pub coordinator: ReplicationCoordinator,
}

impl Cluster {
    pub fn new() -> Self {
        let fs = Arc::new(MemoryFileSystem::new());
        let events = Arc::new(MemoryEventLog::new());
        let primary = Warehouse::new(
            Arc::new(MemoryMetastore::new()),
            events.clone(),
            fs.clone(),
            loc("/warehouse"),
        );
        primary.create_database(PRIMARY_DB).unwrap();

        let replica = Arc::new(MemoryMetastore::new());
        let replica_view = Warehouse::new(
            replica.clone(),
            Arc::new(MemoryEventLog::new()),
            fs.clone(),
            loc("/replica_warehouse"),
        );
        let coordinator = ReplicationCoordinator::new(fs.clone(), loc("/repl"));

        Self {
            fs,
            events,
            primary,
            replica,
            replica_view,
            coordinator,
        }
    }

    pub fn try_dump(
        &self,
        from: Option<EventId>,
        options: &ReplicationOptions,
    ) -> ReplResult<DumpOutcome> {
        self.coordinator.dump(
            self.primary.metastore(),
            self.primary.events(),
            PRIMARY_DB,
            from,
            options,
        )
    }

    pub fn dump(&self, from: Option<EventId>, options: &ReplicationOptions) -> DumpOutcome {
        self.try_dump(from, options).unwrap()
    }

    pub fn try_load(&self, dump: &DumpOutcome, options: &ReplicationOptions) -> ReplResult<EventId> {
        self.coordinator
            .load(self.replica.as_ref(), REPLICA_DB, &dump.dump_location, options)
    }

    pub fn load(&self, dump: &DumpOutcome, options: &ReplicationOptions) -> EventId {
        self.try_load(dump, options).unwrap()
    }

    /// Dump after `from` and load it, returning the new watermark.
    pub fn cycle(&self, from: Option<EventId>, options: &ReplicationOptions) -> EventId {
        let dump = self.dump(from, options);
        self.load(&dump, options)
    }

    pub fn replica_table(&self, name: &str) -> Option<Table> {
        self.replica.get_table(REPLICA_DB, name).unwrap()
    }

    pub fn replica_partition(&self, table: &str, spec: &PartitionSpec) -> Option<Partition> {
        self.replica.get_partition(REPLICA_DB, table, spec).unwrap()
    }

    pub fn replica_watermark(&self) -> Option<EventId> {
        self.replica
            .get_database(REPLICA_DB)
            .unwrap()
            .and_then(|db| db.watermark)
    }

    /// Table names listed by a manifest, `None` when the file is absent.
    pub fn manifest_tables(&self, path: &DataLocation) -> Option<Vec<String>> {
        ManifestReader::new(self.fs.as_ref())
            .read(path)
            .unwrap()
            .map(|entries| entries.into_iter().map(|e| e.table).collect())
    }

    pub fn exists(&self, location: &DataLocation) -> bool {
        self.fs.exists(location).unwrap()
    }
}
