//! Directory-backed metastore
//!
//! The whole catalog is one JSON document at `<dir>/catalog.json`. A commit
//! writes the next document to `catalog.json.tmp`, fsyncs it and renames it
//! over the old one, so readers and a crashed process only ever observe a
//! fully committed catalog.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, warn};

use super::metastore::{CatalogState, Metastore, MetastoreBatch};
use super::types::{Database, Partition, PartitionSpec, Table};
use crate::errors::{ReplError, ReplResult};

const CATALOG_FILE: &str = "catalog.json";

/// Metastore persisted under a data directory
#[derive(Debug)]
pub struct FileMetastore {
    dir: PathBuf,
    state: RwLock<CatalogState>,
}

impl FileMetastore {
    /// Opens the catalog under `dir`, creating an empty one if none exists.
    pub fn open(dir: &Path) -> ReplResult<Self> {
        fs::create_dir_all(dir).map_err(|e| {
            ReplError::StorageWrite(format!("create metastore dir {}: {}", dir.display(), e))
        })?;

        let path = dir.join(CATALOG_FILE);
        let state = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                ReplError::StorageRead(format!("corrupt catalog {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => CatalogState::default(),
            Err(e) => {
                return Err(ReplError::StorageRead(format!(
                    "read catalog {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        debug!(path = %path.display(), "opened file metastore");

        Ok(Self {
            dir: dir.to_path_buf(),
            state: RwLock::new(state),
        })
    }

    /// Directory holding `catalog.json`
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn persist(&self, state: &CatalogState) -> ReplResult<()> {
        let path = self.dir.join(CATALOG_FILE);
        let tmp = self.dir.join(format!("{}.tmp", CATALOG_FILE));
        let write_err = |what: &str, e: io::Error| {
            ReplError::StorageWrite(format!("{} {}: {}", what, tmp.display(), e))
        };

        let json = serde_json::to_string_pretty(state)
            .map_err(|e| ReplError::StorageWrite(format!("serialize catalog: {}", e)))?;

        let mut file = File::create(&tmp).map_err(|e| write_err("create", e))?;
        file.write_all(json.as_bytes())
            .map_err(|e| write_err("write", e))?;
        // fsync is mandatory before the rename makes it visible
        file.sync_all().map_err(|e| write_err("fsync", e))?;

        if let Err(e) = fs::rename(&tmp, &path) {
            if let Err(cleanup) = fs::remove_file(&tmp) {
                warn!(
                    path = %tmp.display(),
                    error = %cleanup,
                    "failed to remove temporary catalog"
                );
            }
            return Err(ReplError::StorageWrite(format!(
                "rename {} to {}: {}",
                tmp.display(),
                path.display(),
                e
            )));
        }

        if let Err(e) = crate::fs::sync_dir(&self.dir) {
            warn!(
                dir = %self.dir.display(),
                error = %e,
                "directory fsync failed after catalog commit"
            );
        }
        Ok(())
    }
}

impl Metastore for FileMetastore {
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
        self.persist(&next)?;
        *state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, MetastoreOp, TableKind};
    use crate::events::EventId;
    use crate::location::DataLocation;
    use tempfile::TempDir;

    #[test]
    fn test_commit_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileMetastore::open(dir.path()).unwrap();
            let mut batch = MetastoreBatch::new();
            batch.push(MetastoreOp::CreateDatabase { name: "replica".into() });
            batch.push(MetastoreOp::PutTable {
                database: "replica".into(),
                table: Table::new(
                    "t1",
                    TableKind::External,
                    vec![Column::new("id", "int")],
                    DataLocation::parse("/replica_external_base/ext/t1").unwrap(),
                ),
            });
            batch.push(MetastoreOp::SetWatermark {
                database: "replica".into(),
                watermark: EventId(12),
            });
            store.commit(batch).unwrap();
        }

        let store = FileMetastore::open(dir.path()).unwrap();
        let db = store.get_database("replica").unwrap().unwrap();
        assert_eq!(db.watermark, Some(EventId(12)));
        let table = store.get_table("replica", "t1").unwrap().unwrap();
        assert_eq!(table.location.path(), "/replica_external_base/ext/t1");
        assert!(!dir.path().join("catalog.json.tmp").exists());
    }

    #[test]
    fn test_failed_commit_is_not_persisted() {
        let dir = TempDir::new().unwrap();
        let store = FileMetastore::open(dir.path()).unwrap();
        let mut batch = MetastoreBatch::new();
        batch.push(MetastoreOp::SetWatermark {
            database: "missing".into(),
            watermark: EventId(1),
        });
        assert!(store.commit(batch).is_err());
        assert!(!dir.path().join("catalog.json").exists());
    }

    #[test]
    fn test_corrupt_catalog_is_a_read_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("catalog.json"), "[[[").unwrap();
        assert!(matches!(
            FileMetastore::open(dir.path()),
            Err(ReplError::StorageRead(_))
        ));
    }
}
