//! Metastore collaborator interface
//!
//! Reads are point lookups and listings. Writes are expressed as a
//! `MetastoreBatch` that the implementation applies all-or-nothing, which is
//! what lets a load commit every mutation together with its watermark.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::types::{normalize_name, Database, Partition, PartitionSpec, Table};
use crate::errors::{ReplError, ReplResult};
use crate::events::EventId;

/// One metastore mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetastoreOp {
    /// Create a database; no-op if it exists
    CreateDatabase { name: String },
    /// Create or replace a table, keeping existing partitions
    PutTable { database: String, table: Table },
    /// Remove a table and all of its partitions; no-op if absent
    DropTable { database: String, table: String },
    /// Create or replace a partition
    PutPartition {
        database: String,
        table: String,
        partition: Partition,
    },
    /// Remove a partition; no-op if absent
    DropPartition {
        database: String,
        table: String,
        spec: PartitionSpec,
    },
    /// Record the last applied replication event
    SetWatermark { database: String, watermark: EventId },
}

/// Ordered list of mutations committed atomically
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetastoreBatch {
    ops: Vec<MetastoreOp>,
}

impl MetastoreBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: MetastoreOp) {
        self.ops.push(op);
    }

    pub fn ops(&self) -> &[MetastoreOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Metastore capability interface
pub trait Metastore: Send + Sync {
    /// Look up a database by (case-insensitive) name.
    fn get_database(&self, name: &str) -> ReplResult<Option<Database>>;

    /// All tables of a database, sorted by name.
    fn list_tables(&self, database: &str) -> ReplResult<Vec<Table>>;

    /// Look up a table.
    fn get_table(&self, database: &str, table: &str) -> ReplResult<Option<Table>>;

    /// All partitions of a table, sorted by spec.
    fn list_partitions(&self, database: &str, table: &str) -> ReplResult<Vec<Partition>>;

    /// Look up a partition.
    fn get_partition(
        &self,
        database: &str,
        table: &str,
        spec: &PartitionSpec,
    ) -> ReplResult<Option<Partition>>;

    /// Apply every op of `batch`, or none of them.
    fn commit(&self, batch: MetastoreBatch) -> ReplResult<()>;
}

/// Table entry of `CatalogState`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct TableEntry {
    pub table: Table,
    /// Keyed by `PartitionSpec::name()`
    #[serde(default)]
    pub partitions: BTreeMap<String, Partition>,
}

/// Database entry of `CatalogState`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct DatabaseEntry {
    #[serde(default)]
    pub watermark: Option<EventId>,
    #[serde(default)]
    pub tables: BTreeMap<String, TableEntry>,
}

/// Whole-catalog value shared by the in-memory and file metastores
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CatalogState {
    #[serde(default)]
    pub databases: BTreeMap<String, DatabaseEntry>,
}

impl CatalogState {
    pub fn database(&self, name: &str) -> Option<Database> {
        let name = normalize_name(name);
        self.databases.get(&name).map(|entry| Database {
            name: name.clone(),
            watermark: entry.watermark,
        })
    }

    fn table_entry(&self, database: &str, table: &str) -> Option<&TableEntry> {
        self.databases
            .get(&normalize_name(database))
            .and_then(|db| db.tables.get(&normalize_name(table)))
    }

    pub fn list_tables(&self, database: &str) -> Vec<Table> {
        self.databases
            .get(&normalize_name(database))
            .map(|db| db.tables.values().map(|t| t.table.clone()).collect())
            .unwrap_or_default()
    }

    pub fn table(&self, database: &str, table: &str) -> Option<Table> {
        self.table_entry(database, table).map(|t| t.table.clone())
    }

    pub fn list_partitions(&self, database: &str, table: &str) -> Vec<Partition> {
        self.table_entry(database, table)
            .map(|t| t.partitions.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn partition(&self, database: &str, table: &str, spec: &PartitionSpec) -> Option<Partition> {
        self.table_entry(database, table)
            .and_then(|t| t.partitions.get(&spec.name()).cloned())
    }

    /// Applies a batch in place. Callers apply to a copy and swap it in only
    /// on success.
    pub fn apply_batch(&mut self, batch: &MetastoreBatch) -> ReplResult<()> {
        for op in batch.ops() {
            self.apply(op)?;
        }
        Ok(())
    }

    fn database_mut(&mut self, name: &str) -> ReplResult<&mut DatabaseEntry> {
        self.databases
            .get_mut(&normalize_name(name))
            .ok_or_else(|| ReplError::StorageWrite(format!("database {} does not exist", name)))
    }

    fn apply(&mut self, op: &MetastoreOp) -> ReplResult<()> {
        match op {
            MetastoreOp::CreateDatabase { name } => {
                self.databases.entry(normalize_name(name)).or_default();
            }
            MetastoreOp::PutTable { database, table } => {
                let db = self.database_mut(database)?;
                let name = normalize_name(&table.name);
                match db.tables.get_mut(&name) {
                    Some(entry) => entry.table = table.clone(),
                    None => {
                        db.tables.insert(
                            name,
                            TableEntry {
                                table: table.clone(),
                                partitions: BTreeMap::new(),
                            },
                        );
                    }
                }
            }
            MetastoreOp::DropTable { database, table } => {
                let db = self.database_mut(database)?;
                db.tables.remove(&normalize_name(table));
            }
            MetastoreOp::PutPartition {
                database,
                table,
                partition,
            } => {
                let db = self.database_mut(database)?;
                let entry = db.tables.get_mut(&normalize_name(table)).ok_or_else(|| {
                    ReplError::StorageWrite(format!(
                        "table {}.{} does not exist",
                        database, table
                    ))
                })?;
                if !partition.spec.matches_keys(&entry.table.partition_keys) {
                    return Err(ReplError::StorageWrite(format!(
                        "partition {} does not match keys of {}.{}",
                        partition.spec, database, table
                    )));
                }
                entry
                    .partitions
                    .insert(partition.spec.name(), partition.clone());
            }
            MetastoreOp::DropPartition {
                database,
                table,
                spec,
            } => {
                let db = self.database_mut(database)?;
                if let Some(entry) = db.tables.get_mut(&normalize_name(table)) {
                    entry.partitions.remove(&spec.name());
                }
            }
            MetastoreOp::SetWatermark {
                database,
                watermark,
            } => {
                self.database_mut(database)?.watermark = Some(*watermark);
            }
        }
        Ok(())
    }
}
