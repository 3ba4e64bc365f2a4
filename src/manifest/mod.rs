//! External table manifest
//!
//! A dump that replicates external tables carries one manifest listing every
//! external table in scope and the location of its data on the primary. The
//! replica uses it to confirm, and if needed correct, the rebased location
//! of each table after the dumped events have been applied.
//!
//! Wire format (UTF-8, no header, one record per table):
//! ```text
//! t1,L2V4dC90MQ==
//! t2,aGRmczovL25uOjgwMjAvZXh0L3Qy
//! ```
//! The second field is `location::encode` of the table location. The file
//! is absent when there is nothing to list.

mod reader;
mod scope;
mod writer;

pub use reader::ManifestReader;
pub use scope::{bootstrap_entries, incremental_entries, ManifestScope};
pub use writer::ManifestWriter;

use crate::catalog::normalize_name;
use crate::errors::{ReplError, ReplResult};
use crate::location::{self, DataLocation};

/// File name of the manifest inside a dump
pub const MANIFEST_FILE_NAME: &str = "_external_tables_info";

/// One manifest record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub table: String,
    pub location: DataLocation,
}

impl ManifestEntry {
    /// Creates an entry.
    ///
    /// # Errors
    ///
    /// Returns `ReplError::Encoding` if the table name is empty or contains
    /// a field or record delimiter.
    pub fn new(table: &str, location: DataLocation) -> ReplResult<Self> {
        if table.is_empty() || table.contains(',') || table.contains('\n') || table.contains('\r')
        {
            return Err(ReplError::encoding(format!(
                "table name cannot be written to a manifest: {:?}",
                table
            )));
        }
        Ok(Self {
            table: normalize_name(table),
            location,
        })
    }

    /// Renders the record without its trailing newline.
    pub fn to_line(&self) -> String {
        format!("{},{}", self.table, location::encode(&self.location))
    }

    /// Parses one record.
    ///
    /// # Errors
    ///
    /// Returns `ReplError::ManifestFormat` when the line does not have
    /// exactly two fields or the location does not decode.
    pub fn parse_line(line: &str) -> ReplResult<Self> {
        let mut fields = line.split(',');
        let (table, encoded) = match (fields.next(), fields.next(), fields.next()) {
            (Some(table), Some(encoded), None) if !table.is_empty() && !encoded.is_empty() => {
                (table, encoded)
            }
            _ => {
                return Err(ReplError::manifest_format(format!(
                    "expected `table,location`: {:?}",
                    line
                )))
            }
        };
        let location = location::decode(encoded).map_err(|e| {
            ReplError::manifest_format(format!("bad location for table {}: {}", table, e))
        })?;
        Ok(Self {
            table: normalize_name(table),
            location,
        })
    }
}

/// Manifest location of a bootstrap dump: `<dump>/<db>/_external_tables_info`
pub fn bootstrap_manifest_path(dump_root: &DataLocation, database: &str) -> ReplResult<DataLocation> {
    dump_root
        .join(&normalize_name(database))?
        .join(MANIFEST_FILE_NAME)
}

/// Manifest location of an incremental dump: `<dump>/_external_tables_info`
pub fn incremental_manifest_path(dump_root: &DataLocation) -> ReplResult<DataLocation> {
    dump_root.join(MANIFEST_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_format() {
        let entry = ManifestEntry::new("T1", DataLocation::parse("/ext/t1").unwrap()).unwrap();
        assert_eq!(entry.to_line(), "t1,L2V4dC90MQ==");
        assert_eq!(ManifestEntry::parse_line("t1,L2V4dC90MQ==").unwrap(), entry);
    }

    #[test]
    fn test_rejects_delimiters_in_name() {
        let loc = DataLocation::parse("/ext/x").unwrap();
        assert!(matches!(
            ManifestEntry::new("a,b", loc.clone()),
            Err(ReplError::Encoding(_))
        ));
        assert!(ManifestEntry::new("a\nb", loc.clone()).is_err());
        assert!(ManifestEntry::new("", loc).is_err());
    }

    #[test]
    fn test_parse_line_errors() {
        for line in ["t1", "t1,", ",L2V4dC90MQ==", "t1,a,b", "t1,@@@", ""] {
            assert!(
                matches!(ManifestEntry::parse_line(line), Err(ReplError::ManifestFormat(_))),
                "line {:?} should be rejected",
                line
            );
        }
    }

    #[test]
    fn test_paths() {
        let root = DataLocation::parse("hdfs://nn/repl/abc").unwrap();
        assert_eq!(
            bootstrap_manifest_path(&root, "Sales").unwrap().to_string(),
            "hdfs://nn/repl/abc/sales/_external_tables_info"
        );
        assert_eq!(
            incremental_manifest_path(&root).unwrap().to_string(),
            "hdfs://nn/repl/abc/_external_tables_info"
        );
    }
}
