//! Metadata reconciliation on the replica
//!
//! Each dumped event is applied to a `StagedCatalog` of the target
//! database. Applying an event that is already reflected in the catalog is a
//! no-op, which makes re-loading a dump safe. Events that reference objects
//! the replica cannot have (an ALTER of a missing table, an INSERT into a
//! missing partition) halt the load with `InconsistentReplicationState`.
//!
//! Dropping never touches the filesystem.

mod reconciler;

pub use reconciler::Reconciler;

use std::fmt;

/// Effect of one event on the replica catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Created,
    Unchanged,
    LocationUpdated,
    Dropped,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Created => "created",
            Transition::Unchanged => "unchanged",
            Transition::LocationUpdated => "location_updated",
            Transition::Dropped => "dropped",
        }
    }

    /// Whether the catalog was modified
    pub fn is_change(&self) -> bool {
        !matches!(self, Transition::Unchanged)
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
