//! Commit-deferred dispatch
//!
//! [`Deferred`] wraps an operation so that it runs only after the enclosing
//! store transaction commits — immediately when no transaction is open,
//! never on rollback. Callers choose between fire-and-forget delivery
//! (result/error callbacks) and an awaitable [`DeferredFuture`].
//!
//! A [`DeferredRegistry`] provides last-write-wins deduplication: two calls
//! sharing a deduplication key collapse to the later one, and the earlier
//! call resolves with an empty result when its deferred moment arrives. The
//! registry is explicit, shareable state; scope one per request context to
//! avoid cross-request supersession.
//!
//! # Example
//!
//! ```no_run
//! use sequent::{Deferred, DeferredRegistry, TransactionHook};
//! use std::sync::Arc;
//!
//! # fn demo(store: &dyn TransactionHook) -> sequent::Result<()> {
//! let registry = Arc::new(DeferredRegistry::new());
//!
//! Deferred::new(registry)
//!     .dedup_key("notify:order:42")
//!     .on_result(|sent| println!("notified: {sent:?}"))
//!     .call(store, || {
//!         // runs after the surrounding transaction commits
//!         Ok(true)
//!     })?;
//! # Ok(())
//! # }
//! ```

use sequent_core::{
    error::{Result, SequentError},
    traits::TransactionHook,
};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::sync::oneshot;

type ResultCallback<T> = Box<dyn FnOnce(Option<T>) + Send>;
type ErrorCallback = Box<dyn FnOnce(SequentError) + Send>;

/// Pending deferred-call table keyed by deduplication key.
///
/// Each key maps to the registration id of its current holder; registering
/// a new call for a key silently supersedes the previous holder, which will
/// skip its operation when its deferred moment arrives. Entries are removed
/// when the holding call actually runs.
///
/// All access is mutex-synchronized, so a registry may be shared across
/// threads.
#[derive(Default)]
pub struct DeferredRegistry {
    entries: Mutex<HashMap<String, u64>>,
    next_id: AtomicU64,
}

impl DeferredRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending entries
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    /// Record a call as the current holder of `key`, superseding any
    /// previous holder. Returns the registration id.
    fn register(&self, key: &str) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.entries.lock().unwrap().insert(key.to_string(), id);
        id
    }

    /// Consume the entry for `key` if `id` is still its current holder.
    ///
    /// Check and removal happen under one lock, so a concurrent
    /// registration can never be consumed by a stale holder.
    fn take_if_current(&self, key: &str, id: u64) -> bool {
        let mut entries = self.entries.lock().unwrap();
        if entries.get(key) == Some(&id) {
            entries.remove(key);
            true
        } else {
            false
        }
    }
}

/// Resolves when the deferred operation has run (or been skipped).
///
/// Output is `Ok(Some(value))` on success, `Ok(None)` when the call was
/// superseded via deduplication, or the operation's error. If the enclosing
/// transaction rolls back the hook is dropped and the future resolves to
/// [`SequentError::Deferred`].
#[derive(Debug)]
pub struct DeferredFuture<T> {
    rx: oneshot::Receiver<Result<Option<T>>>,
}

impl<T> Future for DeferredFuture<T> {
    type Output = Result<Option<T>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx).poll(cx).map(|res| {
            res.unwrap_or_else(|_| {
                Err(SequentError::Deferred(
                    "commit hook dropped before running (transaction rolled back?)".into(),
                ))
            })
        })
    }
}

/// Builder for one commit-deferred call
///
/// Delivery is either fire-and-forget ([`call`](Self::call), results routed
/// to [`on_result`](Self::on_result) / [`on_error`](Self::on_error)) or
/// awaitable ([`call_awaitable`](Self::call_awaitable)). The two are
/// mutually exclusive per call and tied to the calling context: blocking
/// calls must not be made from an async context and awaitable calls require
/// one, checked before any side effect.
pub struct Deferred<T> {
    registry: Arc<DeferredRegistry>,
    dedup_key: Option<String>,
    callback: Option<ResultCallback<T>>,
    error_callback: Option<ErrorCallback>,
}

impl<T: Send + 'static> Deferred<T> {
    pub fn new(registry: Arc<DeferredRegistry>) -> Self {
        Self {
            registry,
            dedup_key: None,
            callback: None,
            error_callback: None,
        }
    }

    /// Deduplicate against other calls sharing `key` (last write wins).
    ///
    /// The key is recorded eagerly at call time, not when the deferred
    /// moment arrives.
    pub fn dedup_key(mut self, key: impl Into<String>) -> Self {
        self.dedup_key = Some(key.into());
        self
    }

    /// Receive the operation's result. `None` means the call was skipped
    /// because a later call took over its deduplication key.
    pub fn on_result(mut self, f: impl FnOnce(Option<T>) + Send + 'static) -> Self {
        self.callback = Some(Box::new(f));
        self
    }

    /// Receive the operation's error. Without an error callback a failing
    /// fire-and-forget operation is logged at error severity.
    pub fn on_error(mut self, f: impl FnOnce(SequentError) + Send + 'static) -> Self {
        self.error_callback = Some(Box::new(f));
        self
    }

    /// Fire-and-forget: run `op` after the current transaction commits, or
    /// immediately when none is open.
    ///
    /// Fails with [`SequentError::ContextMismatch`] when invoked from
    /// inside an async runtime; use
    /// [`call_awaitable`](Self::call_awaitable) there.
    pub fn call<F>(self, hook: &dyn TransactionHook, op: F) -> Result<()>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(SequentError::ContextMismatch(
                "cannot make a blocking deferred call from an async context".into(),
            ));
        }
        self.schedule(hook, op, None);
        Ok(())
    }

    /// Awaitable variant of [`call`](Self::call).
    ///
    /// Fails with [`SequentError::ContextMismatch`] when invoked outside an
    /// async runtime.
    pub fn call_awaitable<F>(
        self,
        hook: &dyn TransactionHook,
        op: F,
    ) -> Result<DeferredFuture<T>>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(SequentError::ContextMismatch(
                "an awaitable deferred call requires an async context".into(),
            ));
        }
        let (tx, rx) = oneshot::channel();
        self.schedule(hook, op, Some(tx));
        Ok(DeferredFuture { rx })
    }

    fn schedule<F>(
        self,
        hook: &dyn TransactionHook,
        op: F,
        sender: Option<oneshot::Sender<Result<Option<T>>>>,
    ) where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let Self {
            registry,
            dedup_key,
            callback,
            error_callback,
        } = self;

        // Dedup registration happens now, before the deferred moment
        let registration = dedup_key.map(|key| {
            let id = registry.register(&key);
            (key, id)
        });

        // The deferred run executes in the context captured here
        let span = tracing::Span::current();

        let run = move || {
            let _guard = span.enter();

            if let Some((key, id)) = &registration {
                if !registry.take_if_current(key, *id) {
                    tracing::info!(
                        key = %key,
                        "skipping deferred call superseded by a later registration"
                    );
                    deliver(sender, callback, error_callback, Ok(None));
                    return;
                }
            }

            match op() {
                Ok(value) => deliver(sender, callback, error_callback, Ok(Some(value))),
                Err(err) => deliver(sender, callback, error_callback, Err(err)),
            }
        };

        if hook.in_transaction() {
            hook.on_commit(Box::new(run));
        } else {
            run();
        }
    }
}

/// Route an outcome to the future or the callbacks.
fn deliver<T>(
    sender: Option<oneshot::Sender<Result<Option<T>>>>,
    callback: Option<ResultCallback<T>>,
    error_callback: Option<ErrorCallback>,
    outcome: Result<Option<T>>,
) {
    if let Some(tx) = sender {
        // Receiver may have been dropped; nothing more to do then
        let _ = tx.send(outcome);
        return;
    }

    match outcome {
        Ok(value) => {
            if let Some(cb) = callback {
                cb(value);
            }
        }
        Err(err) => {
            if let Some(cb) = error_callback {
                cb(err);
            } else {
                tracing::error!(error = %err, "deferred call failed with no error callback");
            }
        }
    }
}
