//! Replication event records
//!
//! One event per metadata change on the primary, in commit order. Every
//! table-scoped payload carries the table kind so that dump scoping can
//! filter external-table events without a metastore lookup.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::{PartitionSpec, Table, TableKind};
use crate::location::DataLocation;

/// Position in the primary's event history.
///
/// `EventId::ZERO` precedes every event; the log assigns ids from 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl EventId {
    pub const ZERO: EventId = EventId(0);

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> EventId {
        EventId(self.0 + 1)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Event body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    CreateTable {
        table: Table,
    },
    DropTable {
        table: String,
        kind: TableKind,
    },
    AlterTableLocation {
        table: String,
        kind: TableKind,
        location: DataLocation,
    },
    AddPartition {
        table: String,
        kind: TableKind,
        spec: PartitionSpec,
        /// `None` places the partition at its default directory under the table
        #[serde(default)]
        location: Option<DataLocation>,
    },
    DropPartition {
        table: String,
        kind: TableKind,
        spec: PartitionSpec,
    },
    AlterPartitionLocation {
        table: String,
        kind: TableKind,
        spec: PartitionSpec,
        location: DataLocation,
    },
    Insert {
        table: String,
        kind: TableKind,
        #[serde(default)]
        spec: Option<PartitionSpec>,
    },
}

impl EventPayload {
    /// Name of the table the event applies to
    pub fn table_name(&self) -> &str {
        match self {
            EventPayload::CreateTable { table } => &table.name,
            EventPayload::DropTable { table, .. }
            | EventPayload::AlterTableLocation { table, .. }
            | EventPayload::AddPartition { table, .. }
            | EventPayload::DropPartition { table, .. }
            | EventPayload::AlterPartitionLocation { table, .. }
            | EventPayload::Insert { table, .. } => table,
        }
    }

    /// Kind of the table the event applies to
    pub fn table_kind(&self) -> TableKind {
        match self {
            EventPayload::CreateTable { table } => table.kind,
            EventPayload::DropTable { kind, .. }
            | EventPayload::AlterTableLocation { kind, .. }
            | EventPayload::AddPartition { kind, .. }
            | EventPayload::DropPartition { kind, .. }
            | EventPayload::AlterPartitionLocation { kind, .. }
            | EventPayload::Insert { kind, .. } => *kind,
        }
    }

    /// DML events carry no metadata change
    pub fn is_dml(&self) -> bool {
        matches!(self, EventPayload::Insert { .. })
    }

    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            EventPayload::CreateTable { .. } => "CREATE_TABLE",
            EventPayload::DropTable { .. } => "DROP_TABLE",
            EventPayload::AlterTableLocation { .. } => "ALTER_TABLE_LOCATION",
            EventPayload::AddPartition { .. } => "ADD_PARTITION",
            EventPayload::DropPartition { .. } => "DROP_PARTITION",
            EventPayload::AlterPartitionLocation { .. } => "ALTER_PARTITION_LOCATION",
            EventPayload::Insert { .. } => "INSERT",
        }
    }
}

/// Event as recorded in the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationEvent {
    pub id: EventId,
    /// Lowercase database name
    pub database: String,
    pub payload: EventPayload,
}

impl ReplicationEvent {
    pub fn new(id: EventId, database: &str, payload: EventPayload) -> Self {
        Self {
            id,
            database: crate::catalog::normalize_name(database),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Column;

    #[test]
    fn test_event_id_ordering() {
        assert!(EventId::ZERO < EventId(1));
        assert_eq!(EventId(4).next(), EventId(5));
        assert_eq!(EventId(7).to_string(), "7");
    }

    #[test]
    fn test_payload_accessors() {
        let table = Table::new(
            "t1",
            TableKind::External,
            vec![Column::new("id", "int")],
            DataLocation::parse("/ext/t1").unwrap(),
        );
        let create = EventPayload::CreateTable { table };
        assert_eq!(create.table_name(), "t1");
        assert_eq!(create.table_kind(), TableKind::External);
        assert!(!create.is_dml());

        let insert = EventPayload::Insert {
            table: "t9".into(),
            kind: TableKind::Managed,
            spec: None,
        };
        assert_eq!(insert.table_name(), "t9");
        assert!(insert.is_dml());
        assert_eq!(insert.label(), "INSERT");
    }

    #[test]
    fn test_event_json_shape() {
        let event = ReplicationEvent::new(
            EventId(3),
            "Sales",
            EventPayload::DropPartition {
                table: "t2".into(),
                kind: TableKind::External,
                spec: PartitionSpec::single("country", "us"),
            },
        );
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["database"], "sales");
        assert_eq!(json["payload"]["type"], "drop_partition");
        assert_eq!(json["payload"]["kind"], "EXTERNAL");

        let back: ReplicationEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
