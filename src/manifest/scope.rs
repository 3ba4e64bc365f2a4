//! Which external tables a manifest lists

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ManifestEntry;
use crate::catalog::{normalize_name, Table, TableSnapshot};
use crate::errors::{ReplError, ReplResult};
use crate::events::{EventPayload, ReplicationEvent};

/// Incremental manifest policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestScope {
    /// Every external table live at the end of the dumped range
    #[default]
    LiveTables,
    /// Only live external tables with at least one event in the range,
    /// DML included
    TouchedTables,
}

impl ManifestScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManifestScope::LiveTables => "live_tables",
            ManifestScope::TouchedTables => "touched_tables",
        }
    }
}

impl fmt::Display for ManifestScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ManifestScope {
    type Err = ReplError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "live_tables" => Ok(ManifestScope::LiveTables),
            "touched_tables" => Ok(ManifestScope::TouchedTables),
            other => Err(ReplError::Config(format!("unknown manifest scope: {}", other))),
        }
    }
}

/// Entries of a bootstrap manifest: every external table in the snapshot.
pub fn bootstrap_entries(snapshots: &[TableSnapshot]) -> ReplResult<Vec<ManifestEntry>> {
    snapshots
        .iter()
        .filter(|s| s.table.is_external())
        .map(|s| ManifestEntry::new(&s.table.name, s.table.location.clone()))
        .collect()
}

/// External tables live after `history`, keyed by name, with the location
/// each had at the last event.
///
/// `history` is every event of the database up to the dump's end, in order.
pub fn tables_at(history: &[ReplicationEvent]) -> BTreeMap<String, Table> {
    let mut tables = BTreeMap::new();
    for event in history {
        match &event.payload {
            EventPayload::CreateTable { table } => {
                tables.insert(normalize_name(&table.name), table.clone());
            }
            EventPayload::DropTable { table, .. } => {
                tables.remove(&normalize_name(table));
            }
            EventPayload::AlterTableLocation {
                table, location, ..
            } => {
                if let Some(t) = tables.get_mut(&normalize_name(table)) {
                    t.location = location.clone();
                }
            }
            _ => {}
        }
    }
    tables.retain(|_, t| t.is_external());
    tables
}

/// Entries of an incremental manifest.
///
/// `history` holds every event of the database up to the end of the dumped
/// range and `range` the events of the range itself. The listed tables and
/// their locations are the ones the replica holds once it has applied the
/// range, whatever the primary's metastore says by the time the dump runs.
pub fn incremental_entries(
    scope: ManifestScope,
    history: &[ReplicationEvent],
    range: &[ReplicationEvent],
) -> ReplResult<Vec<ManifestEntry>> {
    let touched: BTreeSet<String> = range
        .iter()
        .map(|e| normalize_name(e.payload.table_name()))
        .collect();

    tables_at(history)
        .into_iter()
        .filter(|(name, _)| match scope {
            ManifestScope::LiveTables => true,
            ManifestScope::TouchedTables => touched.contains(name),
        })
        .map(|(name, t)| ManifestEntry::new(&name, t.location))
        .collect()
}
