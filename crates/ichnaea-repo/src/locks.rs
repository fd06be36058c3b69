use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use ichnaea_types::DatasetPath;
use tokio::sync::OwnedMutexGuard;

use crate::error::{RepositoryError, RepositoryResult};

/// Registry of per-path async mutexes.
///
/// Each dataset path gets its own lock on first use; holding the returned
/// guard is the path's critical section. Locks for distinct paths are
/// independent. An entry lives only while a guard or waiter references it.
#[derive(Debug, Default)]
pub struct PathLocks {
    locks: Mutex<HashMap<DatasetPath, Arc<tokio::sync::Mutex<()>>>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and take the critical section of `path`.
    pub async fn acquire(&self, path: &DatasetPath) -> RepositoryResult<OwnedMutexGuard<()>> {
        let lock = {
            let mut locks = self.locks.lock().map_err(|_| RepositoryError::LockPoisoned)?;
            // The registry's own reference is the only one left on idle entries.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(path.clone()).or_default())
        };
        Ok(lock.lock_owned().await)
    }
}
