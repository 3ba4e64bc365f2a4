//! Replication event log
//!
//! Metadata changes on the primary are modelled as an explicit ordered
//! sequence of typed records. Dumps read ranges of it; the reconciler on the
//! replica consumes it as a deterministic reducer.

mod event;
mod log;

pub use event::{EventId, EventPayload, ReplicationEvent};
pub use log::{EventStore, FileEventLog, MemoryEventLog};
