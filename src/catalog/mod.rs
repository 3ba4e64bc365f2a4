//! Catalog model and metastore collaborators
//!
//! The metastore is an external collaborator reached through the `Metastore`
//! trait. Two implementations ship with the crate:
//!
//! - `MemoryMetastore` for embedding and tests
//! - `FileMetastore`, one atomically replaced JSON document per data directory
//!
//! `StagedCatalog` layers a load's pending mutations over a metastore so the
//! whole load commits as one batch.

mod file;
mod memory;
mod metastore;
mod staged;
mod types;

pub use file::FileMetastore;
pub use memory::MemoryMetastore;
pub use metastore::{Metastore, MetastoreBatch, MetastoreOp};
pub use staged::StagedCatalog;
pub use types::{
    normalize_name, validate_name, Column, Database, Partition, PartitionSpec, Table, TableKind,
    TableSnapshot,
};
