//! Sequent Core: Traits and types for the sequent allocation layer
//!
//! This crate defines the abstractions shared by the sequence allocator and
//! the commit-deferred dispatcher:
//! - `SequenceStore`: atomic fetch-and-increment of named persistent counters
//! - `TransactionHook`: run a callback after the active transaction commits
//! - `SequentError`: the error taxonomy for both components
//!
//! Concrete store implementations live in companion crates (e.g.
//! `sequent-sqlite`). The allocator and dispatcher in the `sequent` crate are
//! written against the traits here, so backends can be swapped or faked in
//! tests.

pub mod config;
pub mod error;
pub mod traits;

pub use config::{StoreConfig, SynchronousMode};
pub use error::{Result, SequentError};
pub use traits::{CommitHook, SequenceStore, TransactionHook};
