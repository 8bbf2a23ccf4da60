use rusqlite::{Connection, OpenFlags};
use sequent_core::{
    error::{Result, SequentError},
    traits::{CommitHook, SequenceStore, TransactionHook},
    StoreConfig, SynchronousMode,
};
use std::sync::{Arc, Mutex};

use crate::txn::TxnState;

/// SQLite-backed sequence store
///
/// Counters live in per-sequence single-row tables. The composite sequence
/// name is interpolated into DDL/DML as a quoted identifier, so arbitrary
/// tenant ids are safe.
pub struct SqliteSequenceStore {
    conn: Arc<Mutex<Connection>>,
    txn: Mutex<TxnState>,
}

/// Quote an identifier for interpolation into SQL.
///
/// Double-quote style with embedded quotes doubled, the SQL-standard
/// escaping rusqlite does not expose directly.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Map a rusqlite failure on a counter statement to the sequent taxonomy.
///
/// SQLite reports a missing counter table as a prepare-time "no such table"
/// error; that is the only failure class the allocator may recover from.
fn map_store_error(name: &str, err: rusqlite::Error) -> SequentError {
    let msg = err.to_string();
    if msg.contains("no such table") {
        SequentError::UndefinedSequence(name.to_string())
    } else {
        SequentError::Store(msg)
    }
}

impl SqliteSequenceStore {
    /// Open a sequence store at the configured path
    pub fn open(cfg: StoreConfig) -> Result<Self> {
        // Create parent directory if needed
        if let Some(parent) = cfg.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            &cfg.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .map_err(|e| SequentError::Store(e.to_string()))?;

        Self::configure_connection(&conn, &cfg)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            txn: Mutex::new(TxnState::default()),
        })
    }

    /// Open an in-memory store (tests, ephemeral use)
    pub fn open_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| SequentError::Store(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            txn: Mutex::new(TxnState::default()),
        })
    }

    /// Configure SQLite connection
    fn configure_connection(conn: &Connection, cfg: &StoreConfig) -> Result<()> {
        if cfg.wal_mode {
            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(|e| SequentError::Config(e.to_string()))?;
        }

        let sync_mode = match cfg.synchronous {
            SynchronousMode::Full => "FULL",
            SynchronousMode::Normal => "NORMAL",
            SynchronousMode::Off => "OFF",
        };
        conn.pragma_update(None, "synchronous", sync_mode)
            .map_err(|e| SequentError::Config(e.to_string()))?;

        conn.pragma_update(None, "cache_size", cfg.cache_size)
            .map_err(|e| SequentError::Config(e.to_string()))?;

        Ok(())
    }

    /// Get the underlying connection (for migrations and custom queries)
    pub fn conn(&self) -> &Arc<Mutex<Connection>> {
        &self.conn
    }

    /// Execute `f` inside a scoped transaction.
    ///
    /// `BEGIN IMMEDIATE` before `f`, `COMMIT` on `Ok`, `ROLLBACK` on `Err`.
    /// Commit hooks registered through [`TransactionHook::on_commit`] while
    /// the transaction is open run after the commit succeeds, with the
    /// connection lock already released so hooks may use the store again.
    /// On rollback the queued hooks are discarded without running.
    pub fn transaction<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>,
    {
        let guard = self.conn.lock().unwrap();
        guard
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| SequentError::Store(e.to_string()))?;
        self.txn.lock().unwrap().open = true;

        match f(&guard) {
            Ok(value) => {
                if let Err(err) = guard.execute_batch("COMMIT") {
                    // A failed COMMIT leaves the transaction open; roll it
                    // back and reset state so the store stays usable and
                    // the queued hooks are discarded, as on any rollback.
                    let _ = guard.execute_batch("ROLLBACK");
                    self.txn.lock().unwrap().close();
                    return Err(SequentError::Store(err.to_string()));
                }
                let hooks = self.txn.lock().unwrap().close();
                drop(guard);
                for hook in hooks {
                    hook();
                }
                Ok(value)
            }
            Err(err) => {
                let _ = guard.execute_batch("ROLLBACK");
                let dropped = self.txn.lock().unwrap().close();
                if !dropped.is_empty() {
                    tracing::debug!(
                        hooks = dropped.len(),
                        "dropping commit hooks on rollback"
                    );
                }
                Err(err)
            }
        }
    }
}

impl SequenceStore for SqliteSequenceStore {
    fn next_value(&self, name: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let ident = quote_ident(name);

        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| SequentError::Store(e.to_string()))?;

        let fetched = conn.query_row(
            &format!("UPDATE {ident} SET value = value + 1 WHERE id = 0 RETURNING value"),
            [],
            |row| row.get::<_, i64>(0),
        );

        match fetched {
            Ok(value) => {
                if let Err(err) = conn.execute_batch("COMMIT") {
                    let _ = conn.execute_batch("ROLLBACK");
                    return Err(SequentError::Store(err.to_string()));
                }
                Ok(value)
            }
            Err(err) => {
                let _ = conn.execute_batch("ROLLBACK");
                Err(map_store_error(name, err))
            }
        }
    }

    fn create_sequence(&self, name: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let ident = quote_ident(name);

        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| SequentError::Store(e.to_string()))?;

        // Seed with 0 so the first increment yields 1 (START 1 semantics).
        // Both statements tolerate a concurrent creator having won the race.
        let created = conn
            .execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {ident} (
                        id INTEGER PRIMARY KEY CHECK (id = 0),
                        value INTEGER NOT NULL
                    )"
                ),
                [],
            )
            .and_then(|_| {
                conn.execute(
                    &format!("INSERT OR IGNORE INTO {ident} (id, value) VALUES (0, 0)"),
                    [],
                )
            });

        match created {
            Ok(_) => {
                if let Err(err) = conn.execute_batch("COMMIT") {
                    let _ = conn.execute_batch("ROLLBACK");
                    return Err(SequentError::Store(err.to_string()));
                }
                tracing::debug!(sequence = %name, "sequence counter ready");
                Ok(())
            }
            Err(err) => {
                let _ = conn.execute_batch("ROLLBACK");
                Err(SequentError::Store(err.to_string()))
            }
        }
    }
}

impl TransactionHook for SqliteSequenceStore {
    fn in_transaction(&self) -> bool {
        self.txn.lock().unwrap().open
    }

    fn on_commit(&self, hook: CommitHook) {
        let mut state = self.txn.lock().unwrap();
        if state.open {
            state.hooks.push(hook);
        } else {
            drop(state);
            hook();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_next_value_on_missing_sequence() {
        let store = SqliteSequenceStore::open_in_memory().unwrap();
        let err = store.next_value("invoice_t1").unwrap_err();
        assert!(err.is_undefined_sequence(), "got {err:?}");
    }

    #[test]
    fn test_create_then_increment() {
        let store = SqliteSequenceStore::open_in_memory().unwrap();
        store.create_sequence("invoice_t1").unwrap();

        assert_eq!(store.next_value("invoice_t1").unwrap(), 1);
        assert_eq!(store.next_value("invoice_t1").unwrap(), 2);
        assert_eq!(store.next_value("invoice_t1").unwrap(), 3);
    }

    #[test]
    fn test_create_is_idempotent() {
        let store = SqliteSequenceStore::open_in_memory().unwrap();
        store.create_sequence("invoice_t1").unwrap();
        store.next_value("invoice_t1").unwrap();

        // Re-creating must not reset the counter
        store.create_sequence("invoice_t1").unwrap();
        assert_eq!(store.next_value("invoice_t1").unwrap(), 2);
    }

    #[test]
    fn test_sequences_are_independent() {
        let store = SqliteSequenceStore::open_in_memory().unwrap();
        store.create_sequence("invoice_t1").unwrap();
        store.create_sequence("invoice_t2").unwrap();

        assert_eq!(store.next_value("invoice_t1").unwrap(), 1);
        assert_eq!(store.next_value("invoice_t1").unwrap(), 2);
        assert_eq!(store.next_value("invoice_t2").unwrap(), 1);
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("plain_t1"), "\"plain_t1\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");

        // A hostile name is treated as an (unknown) identifier, not as SQL
        let store = SqliteSequenceStore::open_in_memory().unwrap();
        let name = "x\"; DROP TABLE y; --";
        store.create_sequence(name).unwrap();
        assert_eq!(store.next_value(name).unwrap(), 1);
    }

    #[test]
    fn test_on_disk_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sequences.db");

        {
            let store = SqliteSequenceStore::open(StoreConfig::new(&path)).unwrap();
            store.create_sequence("order_t1").unwrap();
            assert_eq!(store.next_value("order_t1").unwrap(), 1);
        }

        let store = SqliteSequenceStore::open(StoreConfig::new(&path)).unwrap();
        assert_eq!(store.next_value("order_t1").unwrap(), 2);
    }

    #[test]
    fn test_commit_hooks_fire_after_commit() {
        let store = SqliteSequenceStore::open_in_memory().unwrap();
        let fired = Arc::new(AtomicUsize::new(0));

        let fired_in = fired.clone();
        store
            .transaction(|conn| {
                conn.execute("CREATE TABLE t (id INTEGER)", [])
                    .map_err(|e| SequentError::Store(e.to_string()))?;
                let fired = fired_in.clone();
                store.on_commit(Box::new(move || {
                    fired.fetch_add(1, Ordering::SeqCst);
                }));
                // Not yet committed, hook must not have run
                assert_eq!(fired_in.load(Ordering::SeqCst), 0);
                Ok(())
            })
            .unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_commit_hooks_dropped_on_rollback() {
        let store = SqliteSequenceStore::open_in_memory().unwrap();
        let fired = Arc::new(AtomicUsize::new(0));

        let fired_in = fired.clone();
        let result: Result<()> = store.transaction(|_conn| {
            let fired = fired_in.clone();
            store.on_commit(Box::new(move || {
                fired.fetch_add(1, Ordering::SeqCst);
            }));
            Err(SequentError::Store("boom".into()))
        });

        assert!(result.is_err());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!store.in_transaction());
    }

    #[test]
    fn test_failed_commit_resets_state_and_drops_hooks() {
        let store = SqliteSequenceStore::open_in_memory().unwrap();

        // Deferred foreign key enforcement makes COMMIT itself fail
        {
            let conn = store.conn().lock().unwrap();
            conn.pragma_update(None, "foreign_keys", true).unwrap();
            conn.execute_batch(
                "CREATE TABLE parent (id INTEGER PRIMARY KEY);
                 CREATE TABLE child (
                     id INTEGER PRIMARY KEY,
                     pid INTEGER REFERENCES parent(id)
                 );",
            )
            .unwrap();
        }

        let fired = Arc::new(AtomicUsize::new(0));
        let fired_in = fired.clone();
        let result: Result<()> = store.transaction(|conn| {
            conn.pragma_update(None, "defer_foreign_keys", true)
                .map_err(|e| SequentError::Store(e.to_string()))?;
            conn.execute("INSERT INTO child (id, pid) VALUES (1, 999)", [])
                .map_err(|e| SequentError::Store(e.to_string()))?;
            let fired = fired_in.clone();
            store.on_commit(Box::new(move || {
                fired.fetch_add(1, Ordering::SeqCst);
            }));
            Ok(())
        });

        assert!(matches!(result, Err(SequentError::Store(_))));

        // The transaction is closed, its hooks are gone, and later
        // on_commit registrations run immediately instead of queueing
        assert!(!store.in_transaction());
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        let fired_in = fired.clone();
        store.on_commit(Box::new(move || {
            fired_in.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // The connection is out of the failed transaction too
        store.create_sequence("post_failure_t1").unwrap();
        assert_eq!(store.next_value("post_failure_t1").unwrap(), 1);
    }

    #[test]
    fn test_on_commit_outside_transaction_runs_immediately() {
        let store = SqliteSequenceStore::open_in_memory().unwrap();
        let fired = Arc::new(AtomicUsize::new(0));

        let fired_in = fired.clone();
        store.on_commit(Box::new(move || {
            fired_in.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_increments_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sequences.db");
        let store = Arc::new(SqliteSequenceStore::open(StoreConfig::new(&path)).unwrap());
        store.create_sequence("stress_t1").unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(std::thread::spawn(move || {
                (0..25)
                    .map(|_| store.next_value("stress_t1").unwrap())
                    .collect::<Vec<_>>()
            }));
        }

        let mut seen = std::collections::HashSet::new();
        for handle in handles {
            for value in handle.join().unwrap() {
                assert!(seen.insert(value), "duplicate counter value {value}");
            }
        }
        assert_eq!(seen.len(), 200);
    }
}
