//! Sequent: tenant-scoped sequence numbers and commit-deferred dispatch
//!
//! Sequent provides two independent components on top of a transactional
//! SQLite store:
//! - **Sequence allocator**: gap-tolerant, duplicate-free formatted numbers
//!   from persistent per-tenant counters, created lazily on first use
//! - **Commit-deferred dispatcher**: run an operation after the enclosing
//!   transaction commits, with last-write-wins deduplication and both
//!   callback and future-based delivery
//!
//! # Quick Start
//!
//! ```no_run
//! use sequent::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<()> {
//! let store = Arc::new(SqliteSequenceStore::open(StoreConfig::new("./sequences.db"))?);
//! let generator = NumberGenerator::new(store);
//!
//! let request = NumberRequest::new("tenant1", "invoice", "%(year)d-%(number)06d")?;
//! let number = generator.allocate(&request)?;
//! // e.g. "2026-000001"
//! # Ok(())
//! # }
//! ```

pub mod crypt;
pub mod deferred;
pub mod number;
pub mod prelude;
pub mod template;

// Re-export core types
pub use sequent_core::{
    config::{StoreConfig, SynchronousMode},
    error::{Result, SequentError},
    traits::{CommitHook, SequenceStore, TransactionHook},
};

// Re-export implementations
pub use sequent_sqlite::SqliteSequenceStore;

// Re-export main types from this crate
pub use deferred::{Deferred, DeferredFuture, DeferredRegistry};
pub use number::{ChecksumAlgorithm, ChecksumConfig, NumberGenerator, NumberRequest};
pub use template::{NumberTemplate, TemplateValue};
