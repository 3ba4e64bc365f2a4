//! Manifest writer

use std::collections::BTreeMap;

use tracing::debug;

use super::ManifestEntry;
use crate::errors::ReplResult;
use crate::fs::{self, FileSystem};
use crate::location::DataLocation;

/// Writes manifests through the filesystem collaborator
pub struct ManifestWriter<'a> {
    fs: &'a dyn FileSystem,
}

impl<'a> ManifestWriter<'a> {
    pub fn new(fs: &'a dyn FileSystem) -> Self {
        Self { fs }
    }

    /// Renders entries sorted by table name, one per table (last wins).
    pub fn render(entries: Vec<ManifestEntry>) -> String {
        let mut by_table = BTreeMap::new();
        for entry in entries {
            by_table.insert(entry.table.clone(), entry);
        }
        by_table
            .values()
            .map(|entry| format!("{}\n", entry.to_line()))
            .collect()
    }

    /// Writes the manifest atomically and returns the number of records.
    ///
    /// Nothing is written when `entries` is empty.
    ///
    /// # Errors
    ///
    /// Returns `ReplError::StorageWrite` if the filesystem rejects the write
    /// or the final rename.
    pub fn write(&self, path: &DataLocation, entries: Vec<ManifestEntry>) -> ReplResult<usize> {
        if entries.is_empty() {
            debug!(path = %path, "no external tables in scope, manifest skipped");
            return Ok(0);
        }

        let content = Self::render(entries);
        let count = content.lines().count();
        fs::write_atomic(self.fs, path, content.as_bytes())?;

        debug!(path = %path, entries = count, "manifest written");
        Ok(count)
    }
}
