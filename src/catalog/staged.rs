//! Staged catalog overlay for one load
//!
//! Reads see the target metastore with every staged mutation applied on top.
//! Writes are recorded both in the overlay and as `MetastoreOp`s; nothing
//! reaches the metastore until the batch is taken and committed.

use std::collections::BTreeMap;

use super::metastore::{Metastore, MetastoreBatch, MetastoreOp};
use super::types::{normalize_name, Partition, PartitionSpec, Table};
use crate::errors::ReplResult;
use crate::events::EventId;

/// Overlay of pending mutations for a single database
pub struct StagedCatalog<'a> {
    base: &'a dyn Metastore,
    database: String,
    database_exists: bool,
    /// `None` marks a table dropped in this batch
    tables: BTreeMap<String, Option<Table>>,
    /// Keyed by `(table, spec name)`; `None` marks a dropped partition
    partitions: BTreeMap<(String, String), Option<Partition>>,
    batch: MetastoreBatch,
}

impl<'a> StagedCatalog<'a> {
    /// Opens an overlay over `database` of `base`.
    pub fn open(base: &'a dyn Metastore, database: &str) -> ReplResult<Self> {
        let database = normalize_name(database);
        let database_exists = base.get_database(&database)?.is_some();
        Ok(Self {
            base,
            database,
            database_exists,
            tables: BTreeMap::new(),
            partitions: BTreeMap::new(),
            batch: MetastoreBatch::new(),
        })
    }

    /// Lowercase name of the staged database
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Stage creation of the database if it does not exist yet.
    pub fn ensure_database(&mut self) {
        if !self.database_exists {
            self.batch.push(MetastoreOp::CreateDatabase {
                name: self.database.clone(),
            });
            self.database_exists = true;
        }
    }

    pub fn table(&self, name: &str) -> ReplResult<Option<Table>> {
        let name = normalize_name(name);
        match self.tables.get(&name) {
            Some(staged) => Ok(staged.clone()),
            None if self.database_exists => self.base.get_table(&self.database, &name),
            None => Ok(None),
        }
    }

    /// Tables visible through the overlay, sorted by name.
    pub fn tables(&self) -> ReplResult<Vec<Table>> {
        let mut merged: BTreeMap<String, Table> = BTreeMap::new();
        if self.database_exists {
            for table in self.base.list_tables(&self.database)? {
                merged.insert(table.name.clone(), table);
            }
        }
        for (name, staged) in &self.tables {
            match staged {
                Some(table) => {
                    merged.insert(name.clone(), table.clone());
                }
                None => {
                    merged.remove(name);
                }
            }
        }
        Ok(merged.into_values().collect())
    }

    pub fn partition(&self, table: &str, spec: &PartitionSpec) -> ReplResult<Option<Partition>> {
        let key = (normalize_name(table), spec.name());
        match self.partitions.get(&key) {
            Some(staged) => Ok(staged.clone()),
            None if self.database_exists => {
                self.base.get_partition(&self.database, &key.0, spec)
            }
            None => Ok(None),
        }
    }

    /// Partitions of `table` visible through the overlay, sorted by spec name.
    pub fn partitions(&self, table: &str) -> ReplResult<Vec<Partition>> {
        let table = normalize_name(table);
        let mut merged: BTreeMap<String, Partition> = BTreeMap::new();
        if self.database_exists {
            for partition in self.base.list_partitions(&self.database, &table)? {
                merged.insert(partition.spec.name(), partition);
            }
        }
        for ((owner, spec_name), staged) in &self.partitions {
            if *owner != table {
                continue;
            }
            match staged {
                Some(partition) => {
                    merged.insert(spec_name.clone(), partition.clone());
                }
                None => {
                    merged.remove(spec_name);
                }
            }
        }
        Ok(merged.into_values().collect())
    }

    /// Stage creation or replacement of a table.
    pub fn put_table(&mut self, table: Table) {
        self.ensure_database();
        self.batch.push(MetastoreOp::PutTable {
            database: self.database.clone(),
            table: table.clone(),
        });
        self.tables.insert(table.name.clone(), Some(table));
    }

    /// Stage removal of a table and its partitions.
    pub fn drop_table(&mut self, name: &str) -> ReplResult<()> {
        let name = normalize_name(name);
        for partition in self.partitions(&name)? {
            self.partitions
                .insert((name.clone(), partition.spec.name()), None);
        }
        self.batch.push(MetastoreOp::DropTable {
            database: self.database.clone(),
            table: name.clone(),
        });
        self.tables.insert(name, None);
        Ok(())
    }

    /// Stage creation or replacement of a partition.
    pub fn put_partition(&mut self, table: &str, partition: Partition) {
        let table = normalize_name(table);
        self.batch.push(MetastoreOp::PutPartition {
            database: self.database.clone(),
            table: table.clone(),
            partition: partition.clone(),
        });
        self.partitions
            .insert((table, partition.spec.name()), Some(partition));
    }

    /// Stage removal of a partition.
    pub fn drop_partition(&mut self, table: &str, spec: &PartitionSpec) {
        let table = normalize_name(table);
        self.batch.push(MetastoreOp::DropPartition {
            database: self.database.clone(),
            table: table.clone(),
            spec: spec.clone(),
        });
        self.partitions.insert((table, spec.name()), None);
    }

    /// Stage the replication watermark.
    pub fn set_watermark(&mut self, watermark: EventId) {
        self.ensure_database();
        self.batch.push(MetastoreOp::SetWatermark {
            database: self.database.clone(),
            watermark,
        });
    }

    /// Number of staged ops
    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    /// Consumes the overlay, returning the ops to commit.
    pub fn into_batch(self) -> MetastoreBatch {
        self.batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, MemoryMetastore, TableKind};
    use crate::location::DataLocation;

    fn table(name: &str) -> Table {
        Table::new(
            name,
            TableKind::External,
            vec![Column::new("place", "string")],
            DataLocation::parse(&format!("/ext/{}", name)).unwrap(),
        )
        .partitioned_by(vec![Column::new("country", "string")])
    }

    fn partition(value: &str) -> Partition {
        Partition::new(
            PartitionSpec::single("country", value),
            DataLocation::parse(&format!("/ext/t2/country={}", value)).unwrap(),
        )
    }

    fn seeded() -> MemoryMetastore {
        let store = MemoryMetastore::new();
        let mut staged = StagedCatalog::open(&store, "db").unwrap();
        staged.put_table(table("t2"));
        staged.put_partition("t2", partition("india"));
        staged.put_partition("t2", partition("us"));
        store.commit(staged.into_batch()).unwrap();
        store
    }

    #[test]
    fn test_reads_see_staged_writes_before_commit() {
        let store = seeded();
        let mut staged = StagedCatalog::open(&store, "DB").unwrap();
        staged.put_table(table("t3"));
        staged.drop_partition("t2", &PartitionSpec::single("country", "us"));

        assert!(staged.table("t3").unwrap().is_some());
        assert_eq!(staged.tables().unwrap().len(), 2);
        assert_eq!(staged.partitions("t2").unwrap().len(), 1);

        // base untouched
        assert!(store.get_table("db", "t3").unwrap().is_none());
        assert_eq!(store.list_partitions("db", "t2").unwrap().len(), 2);
    }

    #[test]
    fn test_drop_then_recreate_hides_old_partitions() {
        let store = seeded();
        let mut staged = StagedCatalog::open(&store, "db").unwrap();
        staged.drop_table("t2").unwrap();
        assert!(staged.table("t2").unwrap().is_none());
        staged.put_table(table("t2"));
        assert!(staged.partitions("t2").unwrap().is_empty());
        assert!(staged
            .partition("t2", &PartitionSpec::single("country", "india"))
            .unwrap()
            .is_none());

        store.commit(staged.into_batch()).unwrap();
        assert!(store.list_partitions("db", "t2").unwrap().is_empty());
    }

    #[test]
    fn test_new_database_is_created_once() {
        let store = MemoryMetastore::new();
        let mut staged = StagedCatalog::open(&store, "fresh").unwrap();
        staged.ensure_database();
        staged.set_watermark(EventId(3));
        staged.ensure_database();
        assert_eq!(staged.pending(), 2);
        store.commit(staged.into_batch()).unwrap();
        assert_eq!(
            store.get_database("fresh").unwrap().unwrap().watermark,
            Some(EventId(3))
        );
    }
}
