use sequent_core::traits::CommitHook;

/// Mutable transaction bookkeeping for a store.
///
/// Tracks whether a scoped transaction is open and the commit hooks queued
/// while it was. Guarded by a mutex on the store; the hooks themselves run
/// outside that lock.
#[derive(Default)]
pub(crate) struct TxnState {
    pub open: bool,
    pub hooks: Vec<CommitHook>,
}

impl TxnState {
    /// Mark the transaction closed and hand back the queued hooks.
    pub fn close(&mut self) -> Vec<CommitHook> {
        self.open = false;
        std::mem::take(&mut self.hooks)
    }
}
