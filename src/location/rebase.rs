//! Replica path rebasing
//!
//! With a configured base, a source location keeps its whole absolute path
//! and trades its scheme and authority for the base's:
//!
//! ```text
//! base   = hdfs://replica-nn/replica_external_base
//! source = hdfs://primary-nn/warehouse/sales.db/t2/country=us
//! result = hdfs://replica-nn/replica_external_base/warehouse/sales.db/t2/country=us
//! ```
//!
//! Without a base the source location is used as-is, which is only safe when
//! primary and replica share one filesystem namespace.

use super::DataLocation;

/// Computes the replica location for `source`.
///
/// Pure: no filesystem access, identical inputs give identical outputs.
pub fn rebase(source: &DataLocation, base: Option<&DataLocation>) -> DataLocation {
    match base {
        None => source.clone(),
        Some(base) => {
            // Both paths are canonical, so the concatenation is too
            let path = match (base.path(), source.path()) {
                ("/", source_path) => source_path.to_string(),
                (base_path, "/") => base_path.to_string(),
                (base_path, source_path) => format!("{}{}", base_path, source_path),
            };
            base.with_canonical_path(path)
        }
    }
}

/// Rebaser bound to one configured base directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rebaser {
    base: Option<DataLocation>,
}

impl Rebaser {
    /// Create a rebaser; `None` keeps source locations unchanged.
    pub fn new(base: Option<DataLocation>) -> Self {
        Self { base }
    }

    /// Configured base directory
    pub fn base(&self) -> Option<&DataLocation> {
        self.base.as_ref()
    }

    /// Rebase one location
    pub fn apply(&self, source: &DataLocation) -> DataLocation {
        rebase(source, self.base.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(s: &str) -> DataLocation {
        DataLocation::parse(s).unwrap()
    }

    #[test]
    fn test_identity_without_base() {
        let source = loc("hdfs://nn/warehouse/t1");
        assert_eq!(rebase(&source, None), source);
    }

    #[test]
    fn test_rebase_replaces_scheme_and_authority() {
        let source = loc("hdfs://primary:8020/warehouse/sales.db/t2/country=us");
        let base = loc("hdfs://replica:8020/replica_external_base");
        let rebased = rebase(&source, Some(&base));
        assert_eq!(
            rebased.to_string(),
            "hdfs://replica:8020/replica_external_base/warehouse/sales.db/t2/country=us"
        );
        assert!(rebased.is_within(&base));
    }

    #[test]
    fn test_rebase_bare_base() {
        let source = loc("hdfs://primary/ext/a");
        let base = loc("/replica_external_base/");
        let rebased = rebase(&source, Some(&base));
        assert_eq!(rebased.to_string(), "/replica_external_base/ext/a");
    }

    #[test]
    fn test_rebase_root_base() {
        let source = loc("/ext/a");
        let base = loc("s3a://bucket/");
        assert_eq!(rebase(&source, Some(&base)).to_string(), "s3a://bucket/ext/a");
    }

    #[test]
    fn test_custom_partition_stays_outside_table_subtree() {
        let base = loc("/replica_external_base");
        let table = loc("/ext/t2");
        let partition = loc("/partition_data/t2/country=france");

        let rebased_table = rebase(&table, Some(&base));
        let rebased_partition = rebase(&partition, Some(&base));

        assert_eq!(
            rebased_partition.to_string(),
            "/replica_external_base/partition_data/t2/country=france"
        );
        assert!(!rebased_partition.is_within(&rebased_table));
    }

    #[test]
    fn test_rebaser_wraps_base() {
        let rebaser = Rebaser::new(Some(loc("/r")));
        assert_eq!(rebaser.apply(&loc("/x/y")).to_string(), "/r/x/y");
        assert_eq!(Rebaser::default().apply(&loc("/x/y")).to_string(), "/x/y");
    }
}
