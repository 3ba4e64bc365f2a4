//! Filesystem trait

use std::fmt;

use super::errors::FsResult;
use crate::location::DataLocation;

/// Distributed filesystem capability interface
///
/// Directories are implicit where the backing store allows it: writing a
/// file creates its parents.
pub trait FileSystem: Send + Sync + fmt::Debug {
    /// Write `data` to a file, replacing any previous content
    fn write(&self, location: &DataLocation, data: &[u8]) -> FsResult<()>;

    /// Read a whole file
    fn read(&self, location: &DataLocation) -> FsResult<Vec<u8>>;

    /// Check if a file or directory exists
    fn exists(&self, location: &DataLocation) -> FsResult<bool>;

    /// Direct children of a directory, sorted
    fn list(&self, location: &DataLocation) -> FsResult<Vec<DataLocation>>;

    /// Delete a file, or a directory when `recursive` is set
    fn delete(&self, location: &DataLocation, recursive: bool) -> FsResult<()>;

    /// Move a file, replacing the destination
    fn rename(&self, from: &DataLocation, to: &DataLocation) -> FsResult<()>;

    /// Create a directory and its parents
    fn create_dir_all(&self, location: &DataLocation) -> FsResult<()>;
}
