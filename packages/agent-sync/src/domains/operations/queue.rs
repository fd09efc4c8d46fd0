//! In-memory queue of operations the poller is watching.
//!
//! Shared between the poller loop and callers that start new operations, so
//! enqueueing never waits on a poll in progress. The lock is only held for the
//! length of a `Vec` operation and never across an `.await`.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domains::operations::models::PendingOperation;

#[derive(Default)]
pub struct OperationQueue {
    entries: Mutex<Vec<PendingOperation>>,
}

impl OperationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<PendingOperation>> {
        // Entries stay valid even if a holder panicked mid-push
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add `operation` unless one with the same id is already queued.
    ///
    /// Returns `true` if it was added.
    pub fn push(&self, operation: PendingOperation) -> bool {
        let mut entries = self.entries();
        if entries
            .iter()
            .any(|o| o.operation_id == operation.operation_id)
        {
            return false;
        }
        entries.push(operation);
        true
    }

    /// Merge `operations` into the queue, skipping ids already present.
    ///
    /// Returns how many were added.
    pub fn extend(&self, operations: impl IntoIterator<Item = PendingOperation>) -> usize {
        let mut added = 0;
        for operation in operations {
            if self.push(operation) {
                added += 1;
            }
        }
        added
    }

    /// Copy of the current entries, in insertion order.
    pub fn snapshot(&self) -> Vec<PendingOperation> {
        self.entries().clone()
    }

    pub fn remove(&self, operation_id: &str) -> bool {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|o| o.operation_id != operation_id);
        entries.len() != before
    }

    pub fn contains(&self, operation_id: &str) -> bool {
        self.entries()
            .iter()
            .any(|o| o.operation_id == operation_id)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
