//! Primary warehouse facade
//!
//! DDL and DML entry points of a primary. Each call validates the request
//! against the metastore, commits the metadata change and appends exactly one
//! replication event for it. Inserts write a data file under the table or
//! partition directory; an insert into a partition that does not exist yet
//! creates it first (one ADD PARTITION event, then the INSERT event).
//!
//! Dropping an external table or partition only removes metadata. Dropping a
//! managed one also deletes its data directory.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::catalog::{
    normalize_name, validate_name, Column, Metastore, MetastoreBatch, MetastoreOp, Partition,
    PartitionSpec, Table, TableKind,
};
use crate::errors::{ReplError, ReplResult};
use crate::events::{EventId, EventPayload, EventStore};
use crate::fs::FileSystem;
use crate::location::DataLocation;

/// Prefix of insert data files
pub const DATA_FILE_PREFIX: &str = "part-";

/// Table to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    pub name: String,
    pub kind: TableKind,
    pub columns: Vec<Column>,
    pub partition_keys: Vec<Column>,
    /// `None` places the table under the warehouse root
    pub location: Option<DataLocation>,
}

impl TableDefinition {
    pub fn new(name: &str, kind: TableKind, columns: Vec<Column>) -> Self {
        Self {
            name: normalize_name(name),
            kind,
            columns,
            partition_keys: Vec::new(),
            location: None,
        }
    }

    pub fn external(name: &str, columns: Vec<Column>) -> Self {
        Self::new(name, TableKind::External, columns)
    }

    pub fn managed(name: &str, columns: Vec<Column>) -> Self {
        Self::new(name, TableKind::Managed, columns)
    }

    pub fn partitioned_by(mut self, keys: Vec<Column>) -> Self {
        self.partition_keys = keys;
        self
    }

    pub fn located_at(mut self, location: DataLocation) -> Self {
        self.location = Some(location);
        self
    }
}

/// DDL/DML front end of a primary
pub struct Warehouse {
    metastore: Arc<dyn Metastore>,
    events: Arc<dyn EventStore>,
    fs: Arc<dyn FileSystem>,
    root: DataLocation,
    /// Keeps event order equal to commit order
    write_lock: Mutex<()>,
}

impl Warehouse {
    /// Creates a warehouse placing managed and default locations under
    /// `root`.
    pub fn new(
        metastore: Arc<dyn Metastore>,
        events: Arc<dyn EventStore>,
        fs: Arc<dyn FileSystem>,
        root: DataLocation,
    ) -> Self {
        Self {
            metastore,
            events,
            fs,
            root,
            write_lock: Mutex::new(()),
        }
    }

    pub fn metastore(&self) -> &dyn Metastore {
        self.metastore.as_ref()
    }

    pub fn events(&self) -> &dyn EventStore {
        self.events.as_ref()
    }

    /// Default location of a table: `<root>/<db>.db/<table>`
    pub fn default_table_location(&self, database: &str, table: &str) -> ReplResult<DataLocation> {
        self.root
            .join(&format!("{}.db", normalize_name(database)))?
            .join(&normalize_name(table))
    }

    pub fn create_database(&self, name: &str) -> ReplResult<()> {
        let _guard = self.write_lock.lock();
        let name = validate_name(name)?;
        if self.metastore.get_database(&name)?.is_some() {
            return Err(ReplError::InvalidOperation(format!(
                "database {} already exists",
                name
            )));
        }
        let mut batch = MetastoreBatch::new();
        batch.push(MetastoreOp::CreateDatabase { name: name.clone() });
        self.metastore.commit(batch)?;
        info!(database = %name, "database created");
        Ok(())
    }

    pub fn create_table(&self, database: &str, definition: TableDefinition) -> ReplResult<EventId> {
        let _guard = self.write_lock.lock();
        let database = self.require_database(database)?;
        validate_name(&definition.name)?;
        if self.metastore.get_table(&database, &definition.name)?.is_some() {
            return Err(ReplError::InvalidOperation(format!(
                "table {}.{} already exists",
                database, definition.name
            )));
        }

        let location = match definition.location {
            Some(location) => location,
            None => self.default_table_location(&database, &definition.name)?,
        };
        let table = Table::new(&definition.name, definition.kind, definition.columns, location)
            .partitioned_by(definition.partition_keys);

        let mut batch = MetastoreBatch::new();
        batch.push(MetastoreOp::PutTable {
            database: database.clone(),
            table: table.clone(),
        });
        self.commit(&database, batch, EventPayload::CreateTable { table })
    }

    pub fn drop_table(&self, database: &str, table: &str) -> ReplResult<EventId> {
        let _guard = self.write_lock.lock();
        let database = self.require_database(database)?;
        let current = self.require_table(&database, table)?;

        let mut data_dirs = Vec::new();
        if current.kind == TableKind::Managed {
            data_dirs.push(current.location.clone());
            for partition in self.metastore.list_partitions(&database, &current.name)? {
                if !partition.location.is_within(&current.location) {
                    data_dirs.push(partition.location);
                }
            }
        }

        let mut batch = MetastoreBatch::new();
        batch.push(MetastoreOp::DropTable {
            database: database.clone(),
            table: current.name.clone(),
        });
        let id = self.commit(
            &database,
            batch,
            EventPayload::DropTable {
                table: current.name.clone(),
                kind: current.kind,
            },
        )?;

        for dir in &data_dirs {
            self.delete_data(dir)?;
        }
        Ok(id)
    }

    pub fn alter_table_location(
        &self,
        database: &str,
        table: &str,
        location: DataLocation,
    ) -> ReplResult<EventId> {
        let _guard = self.write_lock.lock();
        let database = self.require_database(database)?;
        let mut current = self.require_table(&database, table)?;
        current.location = location.clone();

        let mut batch = MetastoreBatch::new();
        batch.push(MetastoreOp::PutTable {
            database: database.clone(),
            table: current.clone(),
        });
        self.commit(
            &database,
            batch,
            EventPayload::AlterTableLocation {
                table: current.name,
                kind: current.kind,
                location,
            },
        )
    }

    pub fn add_partition(
        &self,
        database: &str,
        table: &str,
        spec: PartitionSpec,
        location: Option<DataLocation>,
    ) -> ReplResult<EventId> {
        let _guard = self.write_lock.lock();
        let database = self.require_database(database)?;
        let current = self.require_table(&database, table)?;
        self.add_partition_locked(&database, &current, spec, location)
    }

    fn add_partition_locked(
        &self,
        database: &str,
        table: &Table,
        spec: PartitionSpec,
        location: Option<DataLocation>,
    ) -> ReplResult<EventId> {
        check_spec(table, &spec)?;
        if self.metastore.get_partition(database, &table.name, &spec)?.is_some() {
            return Err(ReplError::InvalidOperation(format!(
                "partition {} of {}.{} already exists",
                spec, database, table.name
            )));
        }

        let partition_location = match &location {
            Some(location) => location.clone(),
            None => table.default_partition_location(&spec)?,
        };
        let mut batch = MetastoreBatch::new();
        batch.push(MetastoreOp::PutPartition {
            database: database.to_string(),
            table: table.name.clone(),
            partition: Partition::new(spec.clone(), partition_location),
        });
        self.commit(
            database,
            batch,
            EventPayload::AddPartition {
                table: table.name.clone(),
                kind: table.kind,
                spec,
                location,
            },
        )
    }

    pub fn drop_partition(
        &self,
        database: &str,
        table: &str,
        spec: &PartitionSpec,
    ) -> ReplResult<EventId> {
        let _guard = self.write_lock.lock();
        let database = self.require_database(database)?;
        let current = self.require_table(&database, table)?;
        let partition = self.require_partition(&database, &current, spec)?;

        let mut batch = MetastoreBatch::new();
        batch.push(MetastoreOp::DropPartition {
            database: database.clone(),
            table: current.name.clone(),
            spec: spec.clone(),
        });
        let id = self.commit(
            &database,
            batch,
            EventPayload::DropPartition {
                table: current.name.clone(),
                kind: current.kind,
                spec: spec.clone(),
            },
        )?;

        if current.kind == TableKind::Managed {
            self.delete_data(&partition.location)?;
        }
        Ok(id)
    }

    pub fn alter_partition_location(
        &self,
        database: &str,
        table: &str,
        spec: &PartitionSpec,
        location: DataLocation,
    ) -> ReplResult<EventId> {
        let _guard = self.write_lock.lock();
        let database = self.require_database(database)?;
        let current = self.require_table(&database, table)?;
        let mut partition = self.require_partition(&database, &current, spec)?;
        partition.location = location.clone();

        let mut batch = MetastoreBatch::new();
        batch.push(MetastoreOp::PutPartition {
            database: database.clone(),
            table: current.name.clone(),
            partition,
        });
        self.commit(
            &database,
            batch,
            EventPayload::AlterPartitionLocation {
                table: current.name,
                kind: current.kind,
                spec: spec.clone(),
                location,
            },
        )
    }

    /// Appends `rows` to a table, or to one partition of a partitioned
    /// table, creating the partition when it does not exist.
    ///
    /// Returns the id of the INSERT event.
    pub fn insert(
        &self,
        database: &str,
        table: &str,
        spec: Option<PartitionSpec>,
        rows: &[&str],
    ) -> ReplResult<EventId> {
        let _guard = self.write_lock.lock();
        let database = self.require_database(database)?;
        let current = self.require_table(&database, table)?;

        let dir = match (&spec, current.is_partitioned()) {
            (None, false) => current.location.clone(),
            (Some(spec), true) => {
                check_spec(&current, spec)?;
                match self.metastore.get_partition(&database, &current.name, spec)? {
                    Some(partition) => partition.location,
                    None => {
                        self.add_partition_locked(&database, &current, spec.clone(), None)?;
                        current.default_partition_location(spec)?
                    }
                }
            }
            (None, true) => {
                return Err(ReplError::InvalidOperation(format!(
                    "insert into partitioned table {}.{} needs a partition",
                    database, current.name
                )))
            }
            (Some(spec), false) => {
                return Err(ReplError::InvalidOperation(format!(
                    "table {}.{} is not partitioned, got partition {}",
                    database, current.name, spec
                )))
            }
        };

        let file = dir.join(&format!("{}{}", DATA_FILE_PREFIX, Uuid::new_v4()))?;
        let mut content = rows.join("\n");
        content.push('\n');
        self.fs
            .write(&file, content.as_bytes())
            .map_err(|e| e.into_write(&format!("write data file {}", file)))?;
        debug!(file = %file, rows = rows.len(), "data file written");

        self.events
            .append(
                &database,
                EventPayload::Insert {
                    table: current.name,
                    kind: current.kind,
                    spec,
                },
            )
    }

    /// CREATE TABLE AS SELECT: a create followed by an insert.
    ///
    /// Returns the id of the INSERT event.
    pub fn create_table_as_select(
        &self,
        database: &str,
        definition: TableDefinition,
        rows: &[&str],
    ) -> ReplResult<EventId> {
        if !definition.partition_keys.is_empty() {
            return Err(ReplError::InvalidOperation(
                "CREATE TABLE AS SELECT into a partitioned table is not supported".into(),
            ));
        }
        let name = definition.name.clone();
        self.create_table(database, definition)?;
        self.insert(database, &name, None, rows)
    }

    /// Rows of a table as seen through this warehouse's metastore.
    ///
    /// Reads every data file directly under the table directory and, for a
    /// partitioned table, under each partition directory. Missing
    /// directories read as empty.
    pub fn select(&self, database: &str, table: &str) -> ReplResult<Vec<String>> {
        let database = self.require_database(database)?;
        let current = self.require_table(&database, table)?;
        let dirs: Vec<DataLocation> = if current.is_partitioned() {
            self.metastore
                .list_partitions(&database, &current.name)?
                .into_iter()
                .map(|p| p.location)
                .collect()
        } else {
            vec![current.location]
        };

        let mut rows = Vec::new();
        for dir in dirs {
            let children = match self.fs.list(&dir) {
                Ok(children) => children,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e.into_read(&format!("list {}", dir))),
            };
            for file in children {
                let is_data = file
                    .segments()
                    .last()
                    .is_some_and(|name| name.starts_with(DATA_FILE_PREFIX));
                if !is_data {
                    continue;
                }
                let bytes = self
                    .fs
                    .read(&file)
                    .map_err(|e| e.into_read(&format!("read {}", file)))?;
                let content = String::from_utf8(bytes)
                    .map_err(|e| ReplError::StorageRead(format!("{} is not UTF-8: {}", file, e)))?;
                rows.extend(content.lines().map(str::to_string));
            }
        }
        Ok(rows)
    }

    /// Commits `batch` and appends its event. When the append fails the
    /// batch is reverted, so the metastore never holds a change the event
    /// log does not.
    fn commit(
        &self,
        database: &str,
        batch: MetastoreBatch,
        payload: EventPayload,
    ) -> ReplResult<EventId> {
        let label = payload.label();
        let table = payload.table_name().to_string();
        let undo = self.undo_batch(&batch)?;
        self.metastore.commit(batch)?;

        let id = match self.events.append(database, payload) {
            Ok(id) => id,
            Err(e) => {
                match self.metastore.commit(undo) {
                    Ok(()) => warn!(
                        database = %database,
                        table = %table,
                        event = label,
                        error = %e,
                        "event append failed, metastore change reverted"
                    ),
                    Err(undo_err) => error!(
                        database = %database,
                        table = %table,
                        event = label,
                        error = %e,
                        undo_error = %undo_err,
                        "event append failed and the metastore change could not be reverted"
                    ),
                }
                return Err(e);
            }
        };
        debug!(event_id = %id, event = label, database = %database, table = %table, "event appended");
        Ok(id)
    }

    /// Batch restoring what `batch` overwrites, in reverse order.
    fn undo_batch(&self, batch: &MetastoreBatch) -> ReplResult<MetastoreBatch> {
        let mut undo = Vec::new();
        for op in batch.ops() {
            match op {
                MetastoreOp::PutTable { database, table } => {
                    undo.push(match self.metastore.get_table(database, &table.name)? {
                        Some(previous) => MetastoreOp::PutTable {
                            database: database.clone(),
                            table: previous,
                        },
                        None => MetastoreOp::DropTable {
                            database: database.clone(),
                            table: table.name.clone(),
                        },
                    });
                }
                MetastoreOp::DropTable { database, table } => {
                    if let Some(previous) = self.metastore.get_table(database, table)? {
                        // reversed below, so the table is restored before its partitions
                        for partition in self.metastore.list_partitions(database, table)? {
                            undo.push(MetastoreOp::PutPartition {
                                database: database.clone(),
                                table: table.clone(),
                                partition,
                            });
                        }
                        undo.push(MetastoreOp::PutTable {
                            database: database.clone(),
                            table: previous,
                        });
                    }
                }
                MetastoreOp::PutPartition {
                    database,
                    table,
                    partition,
                } => {
                    undo.push(
                        match self.metastore.get_partition(database, table, &partition.spec)? {
                            Some(previous) => MetastoreOp::PutPartition {
                                database: database.clone(),
                                table: table.clone(),
                                partition: previous,
                            },
                            None => MetastoreOp::DropPartition {
                                database: database.clone(),
                                table: table.clone(),
                                spec: partition.spec.clone(),
                            },
                        },
                    );
                }
                MetastoreOp::DropPartition {
                    database,
                    table,
                    spec,
                } => {
                    if let Some(previous) = self.metastore.get_partition(database, table, spec)? {
                        undo.push(MetastoreOp::PutPartition {
                            database: database.clone(),
                            table: table.clone(),
                            partition: previous,
                        });
                    }
                }
                MetastoreOp::CreateDatabase { .. } | MetastoreOp::SetWatermark { .. } => {
                    return Err(ReplError::InvalidOperation(format!(
                        "{:?} is not an event-producing change",
                        op
                    )))
                }
            }
        }

        let mut batch = MetastoreBatch::new();
        for op in undo.into_iter().rev() {
            batch.push(op);
        }
        Ok(batch)
    }

    fn delete_data(&self, dir: &DataLocation) -> ReplResult<()> {
        match self.fs.delete(dir, true) {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e.into_write(&format!("delete {}", dir))),
        }
    }

    fn require_database(&self, database: &str) -> ReplResult<String> {
        let name = normalize_name(database);
        match self.metastore.get_database(&name)? {
            Some(_) => Ok(name),
            None => Err(ReplError::UnknownDatabase(name)),
        }
    }

    fn require_table(&self, database: &str, table: &str) -> ReplResult<Table> {
        self.metastore.get_table(database, table)?.ok_or_else(|| {
            ReplError::InvalidOperation(format!("table {}.{} does not exist", database, table))
        })
    }

    fn require_partition(
        &self,
        database: &str,
        table: &Table,
        spec: &PartitionSpec,
    ) -> ReplResult<Partition> {
        self.metastore
            .get_partition(database, &table.name, spec)?
            .ok_or_else(|| {
                ReplError::InvalidOperation(format!(
                    "partition {} of {}.{} does not exist",
                    spec, database, table.name
                ))
            })
    }
}

fn check_spec(table: &Table, spec: &PartitionSpec) -> ReplResult<()> {
    if !spec.matches_keys(&table.partition_keys) {
        return Err(ReplError::InvalidOperation(format!(
            "partition {} does not match the partition keys of {}",
            spec, table.name
        )));
    }
    Ok(())
}
