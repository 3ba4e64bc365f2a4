//! Per-invocation replication options

use crate::location::DataLocation;
use crate::manifest::ManifestScope;

/// Options of one dump or load
///
/// Defaults leave external tables out of replication, matching a warehouse
/// where the feature has not been turned on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicationOptions {
    /// Replicate external table metadata and write manifests
    pub include_external_tables: bool,

    /// Replica directory that external locations are rebased under.
    ///
    /// `None` keeps primary locations verbatim.
    pub external_table_base_directory: Option<DataLocation>,

    /// Leave DML events out of dumps
    pub metadata_only: bool,

    /// Which external tables an incremental manifest lists
    pub manifest_scope: ManifestScope,
}

impl ReplicationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options with external table replication on.
    pub fn with_external_tables(base: Option<DataLocation>) -> Self {
        Self {
            include_external_tables: true,
            external_table_base_directory: base,
            ..Self::default()
        }
    }

    pub fn metadata_only(mut self, metadata_only: bool) -> Self {
        self.metadata_only = metadata_only;
        self
    }

    pub fn manifest_scope(mut self, scope: ManifestScope) -> Self {
        self.manifest_scope = scope;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ReplicationOptions::new();
        assert!(!options.include_external_tables);
        assert!(!options.metadata_only);
        assert!(options.external_table_base_directory.is_none());
        assert_eq!(options.manifest_scope, ManifestScope::LiveTables);
    }

    #[test]
    fn test_builders() {
        let base = DataLocation::parse("/replica_external_base").unwrap();
        let options = ReplicationOptions::with_external_tables(Some(base.clone()))
            .metadata_only(true)
            .manifest_scope(ManifestScope::TouchedTables);
        assert!(options.include_external_tables);
        assert!(options.metadata_only);
        assert_eq!(options.external_table_base_directory, Some(base));
        assert_eq!(options.manifest_scope, ManifestScope::TouchedTables);
    }
}
