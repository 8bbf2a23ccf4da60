use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SequentError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Sequence '{0}' does not exist")]
    UndefinedSequence(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Cannot obtain next number for sequence '{0}'")]
    AllocationFailed(String),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Calling context mismatch: {0}")]
    ContextMismatch(String),

    #[error("Deferred call never ran: {0}")]
    Deferred(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl SequentError {
    /// Whether this error is the transient "counter not yet created" class.
    ///
    /// Only this class may trigger lazy sequence creation and a retry;
    /// every other store failure is fatal and must propagate unchanged.
    pub fn is_undefined_sequence(&self) -> bool {
        matches!(self, SequentError::UndefinedSequence(_))
    }
}

pub type Result<T> = std::result::Result<T, SequentError>;

// Custom Error Types:
//
// Sequent supports custom error types through the `#[from] anyhow::Error`
// variant. Any error implementing `std::error::Error + Send + Sync + 'static`
// can be converted to `SequentError::Other`. Deferred operations that fail
// with a domain-specific error should route it through this variant so the
// dispatcher can deliver it to the error callback or future unchanged.
