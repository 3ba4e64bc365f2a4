//! Per-database exclusive leases
//!
//! At most one dump and at most one load run per database at a time. A
//! second caller for the same database blocks until the lease is released;
//! callers for different databases never contend.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::catalog::normalize_name;

#[derive(Debug, Default)]
struct Registry {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

/// Lease registry keyed by lowercase database name
#[derive(Debug, Clone, Default)]
pub struct DatabaseLeases {
    registry: Arc<Registry>,
}

impl DatabaseLeases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the lease for `database` is free, then takes it.
    pub fn acquire(&self, database: &str) -> DatabaseLease {
        let name = normalize_name(database);
        let mut held = self.registry.held.lock();
        while held.contains(&name) {
            debug!(database = %name, "waiting for database lease");
            self.registry.released.wait(&mut held);
        }
        held.insert(name.clone());
        DatabaseLease {
            registry: Arc::clone(&self.registry),
            database: name,
        }
    }

    /// Takes the lease if it is free.
    pub fn try_acquire(&self, database: &str) -> Option<DatabaseLease> {
        let name = normalize_name(database);
        let mut held = self.registry.held.lock();
        if !held.insert(name.clone()) {
            return None;
        }
        Some(DatabaseLease {
            registry: Arc::clone(&self.registry),
            database: name,
        })
    }

    pub fn is_held(&self, database: &str) -> bool {
        self.registry.held.lock().contains(&normalize_name(database))
    }
}

/// Held lease; released on drop
#[derive(Debug)]
pub struct DatabaseLease {
    registry: Arc<Registry>,
    database: String,
}

impl DatabaseLease {
    pub fn database(&self) -> &str {
        &self.database
    }
}

impl Drop for DatabaseLease {
    fn drop(&mut self) {
        self.registry.held.lock().remove(&self.database);
        self.registry.released.notify_all();
    }
}
