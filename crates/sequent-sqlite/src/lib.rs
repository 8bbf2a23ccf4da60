//! SQLite-backed sequence store
//!
//! Each counter is a single-row table named after the composite sequence
//! name. `next_value` is an `UPDATE ... RETURNING` inside an immediate
//! transaction, so uniqueness under concurrent callers comes from SQLite's
//! write serialization, not from in-process locking.

mod store;
mod txn;

pub use store::SqliteSequenceStore;
