//! Catalog object model
//!
//! Database and table names are case-insensitive and stored lowercase.
//! Partition values keep their case.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{ReplError, ReplResult};
use crate::events::EventId;
use crate::location::DataLocation;

/// Lowercases a database, table or column name.
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
}

/// Normalizes a database or table name and checks that it can name a dump
/// directory and a manifest record: ASCII letters, digits and `_`, starting
/// with a letter or digit.
///
/// # Errors
///
/// Returns `ReplError::InvalidOperation` naming the offending name.
pub fn validate_name(name: &str) -> ReplResult<String> {
    let valid = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(ReplError::InvalidOperation(format!(
            "invalid name {:?}: use ASCII letters, digits and '_', starting with a letter or digit",
            name
        )));
    }
    Ok(normalize_name(name))
}

/// Who owns a table's data lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableKind {
    /// Data lifecycle owned by the warehouse
    Managed,
    /// Data lives outside the warehouse; dropping never deletes it
    External,
}

impl TableKind {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TableKind::Managed => "MANAGED",
            TableKind::External => "EXTERNAL",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Typed column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: String,
}

impl Column {
    pub fn new(name: &str, data_type: &str) -> Self {
        Self {
            name: normalize_name(name),
            data_type: data_type.to_lowercase(),
        }
    }
}

/// Ordered partition column values, e.g. `country=india/state=ka`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionSpec(Vec<(String, String)>);

impl PartitionSpec {
    /// Create a spec from `(column, value)` pairs in partition-key order.
    pub fn new<K: AsRef<str>, V: Into<String>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (normalize_name(k.as_ref()), v.into()))
                .collect(),
        )
    }

    /// Single-column spec
    pub fn single(column: &str, value: impl Into<String>) -> Self {
        Self::new([(column, value)])
    }

    /// Parses `k=v/k2=v2`.
    pub fn parse(name: &str) -> ReplResult<Self> {
        let mut pairs = Vec::new();
        for part in name.split('/').filter(|p| !p.is_empty()) {
            let (k, v) = part.split_once('=').ok_or_else(|| {
                ReplError::InvalidOperation(format!("invalid partition spec: {}", name))
            })?;
            if k.is_empty() {
                return Err(ReplError::InvalidOperation(format!(
                    "invalid partition spec: {}",
                    name
                )));
            }
            pairs.push((k, v.to_string()));
        }
        if pairs.is_empty() {
            return Err(ReplError::InvalidOperation("empty partition spec".into()));
        }
        Ok(Self::new(pairs))
    }

    /// Column/value pairs
    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Canonical name, also the default directory fragment under the table
    pub fn name(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Whether the spec names exactly the given partition keys, in order.
    pub fn matches_keys(&self, keys: &[Column]) -> bool {
        self.0.len() == keys.len()
            && self
                .0
                .iter()
                .zip(keys)
                .all(|((column, _), key)| *column == key.name)
    }
}

impl fmt::Display for PartitionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Table metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub kind: TableKind,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub partition_keys: Vec<Column>,
    pub location: DataLocation,
}

impl Table {
    pub fn new(name: &str, kind: TableKind, columns: Vec<Column>, location: DataLocation) -> Self {
        Self {
            name: normalize_name(name),
            kind,
            columns,
            partition_keys: Vec::new(),
            location,
        }
    }

    /// Sets the partition key columns.
    pub fn partitioned_by(mut self, keys: Vec<Column>) -> Self {
        self.partition_keys = keys;
        self
    }

    pub fn is_partitioned(&self) -> bool {
        !self.partition_keys.is_empty()
    }

    pub fn is_external(&self) -> bool {
        matches!(self.kind, TableKind::External)
    }

    /// Default location of a partition under this table.
    pub fn default_partition_location(&self, spec: &PartitionSpec) -> ReplResult<DataLocation> {
        self.location.join(&spec.name())
    }
}

/// Partition metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub spec: PartitionSpec,
    pub location: DataLocation,
}

impl Partition {
    pub fn new(spec: PartitionSpec, location: DataLocation) -> Self {
        Self { spec, location }
    }
}

/// Database record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Database {
    pub name: String,
    /// Last replication event applied to this database, if it is a replica
    pub watermark: Option<EventId>,
}

/// A table together with all of its partitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub table: Table,
    #[serde(default)]
    pub partitions: Vec<Partition>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_lowercased() {
        let table = Table::new(
            "T1",
            TableKind::External,
            vec![Column::new("ID", "INT")],
            DataLocation::parse("/ext/t1").unwrap(),
        );
        assert_eq!(table.name, "t1");
        assert_eq!(table.columns[0].name, "id");
        assert_eq!(table.columns[0].data_type, "int");
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("Sales_2024").unwrap(), "sales_2024");
        for bad in ["", "a/b", "a,b", "t\n1", "_external_tables_info", "..", "na me", "caf\u{e9}"] {
            assert!(
                matches!(validate_name(bad), Err(ReplError::InvalidOperation(_))),
                "{:?} accepted",
                bad
            );
        }
    }

    #[test]
    fn test_partition_spec_name_and_parse() {
        let spec = PartitionSpec::new([("Country", "India"), ("state", "ka")]);
        assert_eq!(spec.name(), "country=India/state=ka");
        assert_eq!(PartitionSpec::parse("country=India/state=ka").unwrap(), spec);
        assert!(PartitionSpec::parse("country").is_err());
        assert!(PartitionSpec::parse("").is_err());
    }

    #[test]
    fn test_spec_matches_keys() {
        let keys = vec![Column::new("country", "string")];
        assert!(PartitionSpec::single("country", "us").matches_keys(&keys));
        assert!(!PartitionSpec::single("state", "tx").matches_keys(&keys));
        assert!(!PartitionSpec::new([("country", "us"), ("state", "tx")]).matches_keys(&keys));
    }

    #[test]
    fn test_default_partition_location() {
        let table = Table::new(
            "t2",
            TableKind::External,
            vec![Column::new("place", "string")],
            DataLocation::parse("hdfs://nn/ext/t2").unwrap(),
        )
        .partitioned_by(vec![Column::new("country", "string")]);

        let loc = table
            .default_partition_location(&PartitionSpec::single("country", "us"))
            .unwrap();
        assert_eq!(loc.to_string(), "hdfs://nn/ext/t2/country=us");
    }

    #[test]
    fn test_kind_serialization() {
        assert_eq!(serde_json::to_string(&TableKind::External).unwrap(), "\"EXTERNAL\"");
        assert_eq!(serde_json::to_string(&TableKind::Managed).unwrap(), "\"MANAGED\"");
    }
}
