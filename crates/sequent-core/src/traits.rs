//! Trait seams between the allocator/dispatcher and their backing store

use crate::error::Result;

/// A callback registered to run after the current transaction commits
pub type CommitHook = Box<dyn FnOnce() + Send>;

/// Persistent named counters with atomic fetch-and-increment
///
/// A counter is identified by its composite name (`{sequence}_{tenant}`).
/// Correctness under concurrent callers is the store's responsibility: two
/// concurrent `next_value` calls for the same name must never observe the
/// same value. Gaps are permitted, duplicates are not.
pub trait SequenceStore: Send + Sync {
    /// Atomically increment the named counter and return the new value.
    ///
    /// Runs in its own short-lived transaction. Returns
    /// [`SequentError::UndefinedSequence`](crate::SequentError::UndefinedSequence)
    /// if the counter has never been created; any other store failure maps
    /// to [`SequentError::Store`](crate::SequentError::Store).
    fn next_value(&self, name: &str) -> Result<i64>;

    /// Create the named counter if it does not exist, seeded so that the
    /// first `next_value` returns 1.
    ///
    /// Idempotent and safe under concurrent creators: racing with another
    /// process that creates the same counter is not an error.
    fn create_sequence(&self, name: &str) -> Result<()>;
}

/// Transaction lifecycle hooks, as provided by the backing store
///
/// The commit-deferred dispatcher uses this to decide whether a wrapped
/// operation runs immediately or after the enclosing transaction commits.
pub trait TransactionHook: Send + Sync {
    /// Whether a transaction is currently open on this store
    fn in_transaction(&self) -> bool;

    /// Register a hook to run after the current transaction commits.
    ///
    /// When no transaction is open the hook runs immediately, on the
    /// caller's thread. Hooks registered inside a transaction that rolls
    /// back are dropped without running.
    fn on_commit(&self, hook: CommitHook);
}
