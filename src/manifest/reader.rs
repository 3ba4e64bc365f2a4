//! Manifest reader

use std::collections::BTreeSet;

use super::ManifestEntry;
use crate::errors::{ReplError, ReplResult};
use crate::fs::{self, FileSystem};
use crate::location::DataLocation;

/// Reads manifests through the filesystem collaborator
pub struct ManifestReader<'a> {
    fs: &'a dyn FileSystem,
}

impl<'a> ManifestReader<'a> {
    pub fn new(fs: &'a dyn FileSystem) -> Self {
        Self { fs }
    }

    /// Parses manifest content.
    ///
    /// # Errors
    ///
    /// Returns `ReplError::ManifestFormat` for malformed records, blank
    /// lines, a missing final newline or a table listed twice.
    pub fn parse(content: &[u8]) -> ReplResult<Vec<ManifestEntry>> {
        let content = std::str::from_utf8(content)
            .map_err(|e| ReplError::manifest_format(format!("manifest is not UTF-8: {}", e)))?;
        if !content.is_empty() && !content.ends_with('\n') {
            return Err(ReplError::manifest_format("last record is not newline terminated"));
        }

        let mut seen = BTreeSet::new();
        let mut entries = Vec::new();
        for (idx, line) in content.split_terminator('\n').enumerate() {
            let entry = ManifestEntry::parse_line(line).map_err(|e| {
                ReplError::manifest_format(format!("line {}: {}", idx + 1, e))
            })?;
            if !seen.insert(entry.table.clone()) {
                return Err(ReplError::manifest_format(format!(
                    "table {} listed more than once",
                    entry.table
                )));
            }
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Reads the manifest at `path`, `None` when the dump has none.
    pub fn read(&self, path: &DataLocation) -> ReplResult<Option<Vec<ManifestEntry>>> {
        match fs::read_optional(self.fs, path)? {
            Some(content) => Ok(Some(Self::parse(&content)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;
    use crate::manifest::ManifestWriter;

    #[test]
    fn test_written_manifest_reads_back() {
        let fs = MemoryFileSystem::new();
        let path = DataLocation::parse("/dump/_external_tables_info").unwrap();
        let entries = vec![
            ManifestEntry::new("t2", DataLocation::parse("hdfs://nn/ext/t2").unwrap()).unwrap(),
            ManifestEntry::new("t1", DataLocation::parse("/ext/t1").unwrap()).unwrap(),
        ];
        ManifestWriter::new(&fs).write(&path, entries).unwrap();

        let read = ManifestReader::new(&fs).read(&path).unwrap().unwrap();
        let tables: Vec<&str> = read.iter().map(|e| e.table.as_str()).collect();
        assert_eq!(tables, vec!["t1", "t2"]);
        assert_eq!(read[1].location.to_string(), "hdfs://nn/ext/t2");
    }

    #[test]
    fn test_absent_manifest() {
        let fs = MemoryFileSystem::new();
        let path = DataLocation::parse("/dump/_external_tables_info").unwrap();
        assert!(ManifestReader::new(&fs).read(&path).unwrap().is_none());
    }

    #[test]
    fn test_parse_errors() {
        let bad: [&[u8]; 5] = [
            b"t1,L2V4dC90MQ==",
            b"t1,L2V4dC90MQ==\n\nt2,L2V4dC90MQ==\n",
            b"t1,L2V4dC90MQ==\nt1,L2V4dC90MQ==\n",
            b"t1;L2V4dC90MQ==\n",
            &[0xff, b'\n'],
        ];
        for content in bad {
            assert!(matches!(
                ManifestReader::parse(content),
                Err(ReplError::ManifestFormat(_))
            ));
        }
        assert!(ManifestReader::parse(b"").unwrap().is_empty());
    }
}
