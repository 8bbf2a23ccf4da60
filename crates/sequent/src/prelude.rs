//! Sequent Prelude
//!
//! Import this to get all commonly used types and traits:
//!
//! ```
//! use sequent::prelude::*;
//! ```

// Core types
pub use crate::{Result, SequentError};

// Configs
pub use crate::{StoreConfig, SynchronousMode};

// Traits
pub use crate::{CommitHook, SequenceStore, TransactionHook};

// Implementations
pub use crate::SqliteSequenceStore;

// Sequence allocation
pub use crate::{ChecksumAlgorithm, ChecksumConfig, NumberGenerator, NumberRequest};

// Templates
pub use crate::{NumberTemplate, TemplateValue};

// Commit-deferred dispatch
pub use crate::{Deferred, DeferredFuture, DeferredRegistry};

// Re-export common external deps
pub use std::sync::Arc;
pub use tracing;
