//! In-memory filesystem
//!
//! Files are keyed by the rendered location. Directories exist explicitly
//! (`create_dir_all`) or implicitly as the parent of any stored entry.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::RwLock;

use super::backend::FileSystem;
use super::errors::{FsError, FsResult};
use crate::location::DataLocation;

#[derive(Debug, Default)]
struct Inner {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    /// File names whose writes and rename targets fail
    failing: BTreeSet<String>,
}

impl Inner {
    fn has_descendants(&self, key: &str) -> bool {
        let prefix = dir_prefix(key);
        self.files
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(k, _)| k.starts_with(&prefix))
            || self
                .dirs
                .range(prefix.clone()..)
                .next()
                .is_some_and(|k| k.starts_with(&prefix))
    }

    fn is_dir(&self, key: &str) -> bool {
        self.dirs.contains(key) || self.has_descendants(key)
    }

    fn check_failure(&self, location: &DataLocation) -> FsResult<()> {
        match location.segments().last() {
            Some(name) if self.failing.contains(name) => Err(FsError::Io(format!(
                "injected write failure: {}",
                location
            ))),
            _ => Ok(()),
        }
    }
}

fn dir_prefix(key: &str) -> String {
    if key.ends_with('/') {
        key.to_string()
    } else {
        format!("{}/", key)
    }
}

/// Filesystem held in process memory
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    inner: RwLock<Inner>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later write or rename onto a file named `file_name` fail.
    pub fn inject_write_failure(&self, file_name: &str) {
        self.inner.write().failing.insert(file_name.to_string());
    }

    pub fn clear_write_failures(&self) {
        self.inner.write().failing.clear();
    }

    /// Number of stored files
    pub fn file_count(&self) -> usize {
        self.inner.read().files.len()
    }
}

impl FileSystem for MemoryFileSystem {
    fn write(&self, location: &DataLocation, data: &[u8]) -> FsResult<()> {
        let mut inner = self.inner.write();
        inner.check_failure(location)?;
        let key = location.to_string();
        if inner.is_dir(&key) {
            return Err(FsError::Io(format!("is a directory: {}", key)));
        }
        inner.files.insert(key, data.to_vec());
        Ok(())
    }

    fn read(&self, location: &DataLocation) -> FsResult<Vec<u8>> {
        self.inner
            .read()
            .files
            .get(&location.to_string())
            .cloned()
            .ok_or_else(|| FsError::NotFound(location.to_string()))
    }

    fn exists(&self, location: &DataLocation) -> FsResult<bool> {
        let inner = self.inner.read();
        let key = location.to_string();
        Ok(inner.files.contains_key(&key) || inner.is_dir(&key))
    }

    fn list(&self, location: &DataLocation) -> FsResult<Vec<DataLocation>> {
        let inner = self.inner.read();
        let key = location.to_string();
        if inner.files.contains_key(&key) {
            return Err(FsError::Io(format!("not a directory: {}", key)));
        }
        if !inner.is_dir(&key) {
            return Err(FsError::NotFound(key));
        }

        let prefix = dir_prefix(&key);
        let mut children = BTreeSet::new();
        for entry in inner.files.keys().chain(inner.dirs.iter()) {
            if let Some(rest) = entry.strip_prefix(&prefix) {
                if let Some(child) = rest.split('/').next().filter(|c| !c.is_empty()) {
                    children.insert(child.to_string());
                }
            }
        }

        children
            .iter()
            .map(|child| {
                location
                    .join(child)
                    .map_err(|e| FsError::Io(e.to_string()))
            })
            .collect()
    }

    fn delete(&self, location: &DataLocation, recursive: bool) -> FsResult<()> {
        let mut inner = self.inner.write();
        let key = location.to_string();
        if inner.files.remove(&key).is_some() {
            return Ok(());
        }
        if !inner.is_dir(&key) {
            return Err(FsError::NotFound(key));
        }
        if !recursive && inner.has_descendants(&key) {
            return Err(FsError::Io(format!("directory not empty: {}", key)));
        }

        let prefix = dir_prefix(&key);
        inner.files.retain(|k, _| !k.starts_with(&prefix));
        inner.dirs.retain(|k| *k != key && !k.starts_with(&prefix));
        Ok(())
    }

    fn rename(&self, from: &DataLocation, to: &DataLocation) -> FsResult<()> {
        let mut inner = self.inner.write();
        inner.check_failure(to)?;
        let from_key = from.to_string();
        let to_key = to.to_string();

        if let Some(data) = inner.files.remove(&from_key) {
            inner.files.insert(to_key, data);
            return Ok(());
        }
        if !inner.is_dir(&from_key) {
            return Err(FsError::NotFound(from_key));
        }

        let from_prefix = dir_prefix(&from_key);
        let to_prefix = dir_prefix(&to_key);
        let moved_files: Vec<(String, Vec<u8>)> = inner
            .files
            .iter()
            .filter(|(k, _)| k.starts_with(&from_prefix))
            .map(|(k, v)| (format!("{}{}", to_prefix, &k[from_prefix.len()..]), v.clone()))
            .collect();
        let moved_dirs: Vec<String> = inner
            .dirs
            .iter()
            .filter(|k| k.starts_with(&from_prefix))
            .map(|k| format!("{}{}", to_prefix, &k[from_prefix.len()..]))
            .collect();

        inner.files.retain(|k, _| !k.starts_with(&from_prefix));
        inner
            .dirs
            .retain(|k| *k != from_key && !k.starts_with(&from_prefix));
        inner.files.extend(moved_files);
        inner.dirs.extend(moved_dirs);
        inner.dirs.insert(to_key);
        Ok(())
    }

    fn create_dir_all(&self, location: &DataLocation) -> FsResult<()> {
        let mut inner = self.inner.write();
        let key = location.to_string();
        if inner.files.contains_key(&key) {
            return Err(FsError::Io(format!("is a file: {}", key)));
        }
        inner.dirs.insert(key);
        Ok(())
    }
}
