//! Filesystem collaborator
//!
//! Dumps, manifests and insert data files go through the `FileSystem`
//! trait. `MemoryFileSystem` backs tests and embedding; `LocalFileSystem`
//! maps locations under a local root directory.

mod backend;
mod errors;
mod local;
mod memory;

pub use backend::FileSystem;
pub use errors::{FsError, FsResult};
pub(crate) use local::sync_dir;
pub use local::LocalFileSystem;
pub use memory::MemoryFileSystem;

use tracing::warn;
use uuid::Uuid;

use crate::errors::ReplResult;
use crate::location::DataLocation;

/// Temporary sibling used while `target` is being written
pub fn temp_location(target: &DataLocation) -> DataLocation {
    target.with_canonical_path(format!("{}.tmp-{}", target.path(), Uuid::new_v4()))
}

/// Writes `data` to a temporary sibling, then renames it over `target`.
///
/// Readers never observe a partially written file. On failure the
/// temporary is removed.
pub fn write_atomic(fs: &dyn FileSystem, target: &DataLocation, data: &[u8]) -> ReplResult<()> {
    let tmp = temp_location(target);
    fs.write(&tmp, data)
        .map_err(|e| e.into_write(&format!("write {}", tmp)))?;

    if let Err(e) = fs.rename(&tmp, target) {
        if let Err(cleanup) = fs.delete(&tmp, false) {
            warn!(path = %tmp, error = %cleanup, "failed to remove temporary file");
        }
        return Err(e.into_write(&format!("rename {} to {}", tmp, target)));
    }
    Ok(())
}

/// Reads a file, returning `None` when it does not exist.
pub fn read_optional(fs: &dyn FileSystem, location: &DataLocation) -> ReplResult<Option<Vec<u8>>> {
    match fs.read(location) {
        Ok(data) => Ok(Some(data)),
        Err(FsError::NotFound(_)) => Ok(None),
        Err(e) => Err(e.into_read(&format!("read {}", location))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_atomic_leaves_no_temporaries() {
        let fs = MemoryFileSystem::new();
        let target = DataLocation::parse("/dump/_external_tables_info").unwrap();
        write_atomic(&fs, &target, b"t1,L2V4dC90MQ==\n").unwrap();
        assert_eq!(fs.read(&target).unwrap(), b"t1,L2V4dC90MQ==\n");
        assert_eq!(fs.file_count(), 1);
    }

    #[test]
    fn test_write_atomic_failure_cleans_up() {
        let fs = MemoryFileSystem::new();
        fs.inject_write_failure("_external_tables_info");
        let target = DataLocation::parse("/dump/_external_tables_info").unwrap();
        let err = write_atomic(&fs, &target, b"x").unwrap_err();
        assert_eq!(err.code(), "REPL_STORAGE_WRITE");
        assert_eq!(fs.file_count(), 0);
    }

    #[test]
    fn test_read_optional() {
        let fs = MemoryFileSystem::new();
        let location = DataLocation::parse("/a").unwrap();
        assert_eq!(read_optional(&fs, &location).unwrap(), None);
        fs.write(&location, b"1").unwrap();
        assert_eq!(read_optional(&fs, &location).unwrap(), Some(b"1".to_vec()));
    }
}
