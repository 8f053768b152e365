//! Append-only log shared by the revocation registry and the audit log.
//!
//! Writers serialize on a lock and publish a new vector; readers clone the
//! current `Arc` and keep an immutable snapshot for as long as they like.
//! An entry is either fully visible in a snapshot or not at all.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::CoreResult;

#[derive(Debug)]
pub struct AppendLog<T> {
    entries: RwLock<Arc<Vec<T>>>,
}

impl<T: Clone> AppendLog<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Build the next entry from the entries already present and append it.
    ///
    /// `make` runs under the write lock, so it sees every earlier append and
    /// no later one; the entry's position is `existing.len()`.
    pub fn append<F>(&self, make: F) -> CoreResult<T>
    where
        F: FnOnce(&[T]) -> CoreResult<T>,
    {
        let mut guard = self.entries.write();
        let entry = make(guard.as_slice())?;
        // Copies the vector only while an older snapshot is still held.
        Arc::make_mut(&mut guard).push(entry.clone());
        Ok(entry)
    }

    pub fn snapshot(&self) -> Arc<Vec<T>> {
        Arc::clone(&self.entries.read())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> Default for AppendLog<T> {
    fn default() -> Self {
        Self::new()
    }
}
