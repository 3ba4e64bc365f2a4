//! tablerepl - metadata replication for warehouse databases
//!
//! Propagates table and partition metadata of a primary database to
//! replicas through repeated dump/load cycles. External tables are
//! replicated by metadata only: their data stays where it is and replica
//! locations are rebased under a configurable base directory. Each dump that
//! replicates external tables carries a manifest of their locations.
//!
//! ```text
//! Warehouse ──events──> EventStore ──dump──> <repl_root>/<dump_id>/ ──load──> replica Metastore
//! ```

pub mod catalog;
pub mod cli;
pub mod coordinator;
pub mod errors;
pub mod events;
pub mod fs;
pub mod location;
pub mod manifest;
pub mod reconcile;
pub mod warehouse;

pub use coordinator::{DumpOutcome, LoadOutcome, ReplicationCoordinator, ReplicationOptions};
pub use errors::{ReplError, ReplResult};
pub use events::EventId;
pub use location::DataLocation;
