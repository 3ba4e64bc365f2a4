//! In-memory metastore

use parking_lot::RwLock;

use super::metastore::{CatalogState, Metastore, MetastoreBatch};
use super::types::{Database, Partition, PartitionSpec, Table};
use crate::errors::ReplResult;

/// Metastore held in process memory.
///
/// Commits apply the batch to a copy of the catalog under the write lock and
/// swap it in only when every op succeeded.
#[derive(Debug, Default)]
pub struct MemoryMetastore {
    state: RwLock<CatalogState>,
}

impl MemoryMetastore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Metastore for MemoryMetastore {
    fn get_database(&self, name: &str) -> ReplResult<Option<Database>> {
        Ok(self.state.read().database(name))
    }

    fn list_tables(&self, database: &str) -> ReplResult<Vec<Table>> {
        Ok(self.state.read().list_tables(database))
    }

    fn get_table(&self, database: &str, table: &str) -> ReplResult<Option<Table>> {
        Ok(self.state.read().table(database, table))
    }

    fn list_partitions(&self, database: &str, table: &str) -> ReplResult<Vec<Partition>> {
        Ok(self.state.read().list_partitions(database, table))
    }

    fn get_partition(
        &self,
        database: &str,
        table: &str,
        spec: &PartitionSpec,
    ) -> ReplResult<Option<Partition>> {
        Ok(self.state.read().partition(database, table, spec))
    }

    fn commit(&self, batch: MetastoreBatch) -> ReplResult<()> {
        let mut state = self.state.write();
        let mut next = state.clone();
        next.apply_batch(&batch)?;
        *state = next;
        Ok(())
    }
}
