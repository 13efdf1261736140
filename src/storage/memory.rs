// ============================================================================
// Case Store
// ============================================================================
//
// Committed tables behind a tokio RwLock. A write transaction holds the
// write lock for its whole run: it clones the tables (O(1)), runs the
// synchronous closure against the clone, logs the changes, and swaps the
// clone in. An error at any step drops the clone, leaving committed state
// untouched. Readers never observe a half-applied transaction.
//
// ============================================================================

use super::persistence::PersistenceManager;
use super::tables::{TableCounts, Tables};
use crate::config::StoreConfig;
use crate::core::Result;
use crate::transaction::{Transaction, TransactionManager, TransactionStats};
use tokio::sync::{Mutex, RwLock};
use tracing::{Level, event};

pub struct CaseStore {
    tables: RwLock<Tables>,
    transactions: TransactionManager,
    persistence: Option<Mutex<PersistenceManager>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub tables: TableCounts,
    pub transactions: TransactionStats,
    pub wal_entries_since_checkpoint: usize,
}

impl CaseStore {
    pub fn in_memory() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            transactions: TransactionManager::new(),
            persistence: None,
        }
    }

    /// Open the store, recovering committed state when a data directory is
    /// configured.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let Some(dir) = config.data_dir.as_ref().filter(|_| config.is_persistent()) else {
            return Ok(Self::in_memory());
        };

        let mut persistence = PersistenceManager::new(dir, config.durability)?;
        persistence
            .wal_mut()
            .set_checkpoint_threshold(config.checkpoint_threshold);
        let tables = persistence.recover()?;

        event!(
            Level::INFO,
            data_dir = %dir.display(),
            cases = tables.registry_len(),
            "case store opened"
        );
        Ok(Self {
            tables: RwLock::new(tables),
            transactions: TransactionManager::new(),
            persistence: Some(Mutex::new(persistence)),
        })
    }

    /// Run `f` against a consistent view of the committed tables.
    pub async fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Tables) -> Result<T>,
    {
        let tables = self.tables.read().await;
        f(&tables)
    }

    /// Run `f` as one all-or-nothing transaction.
    pub(crate) async fn transact<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction) -> Result<T>,
    {
        let mut committed = self.tables.write().await;
        let mut txn = self.transactions.begin(committed.clone());
        let txn_id = txn.id();

        let value = match f(&mut txn) {
            Ok(value) => value,
            Err(err) => {
                txn.rollback()?;
                self.transactions.record_abort(&err);
                event!(Level::DEBUG, txn = %txn_id, state = %txn.state(), error = %err, "transaction rolled back");
                return Err(err);
            }
        };

        txn.commit()?;
        let elapsed = txn.duration();
        let (tables, changes) = txn.into_committed()?;

        let mut persistence = match &self.persistence {
            Some(persistence) => Some(persistence.lock().await),
            None => None,
        };
        // Blocking file I/O (and `sync_all` in Sync mode) on the executor
        // while the write lock is held: writers are serialized anyway in a
        // single-process store, and readers wait at most one WAL append.
        if let Some(persistence) = persistence.as_mut() {
            if let Err(err) = persistence.log_commit(txn_id, &changes) {
                self.transactions.record_abort(&err);
                event!(Level::ERROR, txn = %txn_id, error = %err, "WAL write failed");
                return Err(err);
            }
        }

        *committed = tables;
        self.transactions.record_commit();
        event!(
            Level::TRACE,
            txn = %txn_id,
            changes = changes.len(),
            removals = changes.iter().filter(|change| change.is_removal()).count(),
            elapsed_us = elapsed.as_micros() as u64,
            "transaction committed"
        );

        // The commit is already durable in the WAL; a failed checkpoint is
        // retried on the next commit.
        if let Some(persistence) = persistence.as_mut() {
            if persistence.needs_checkpoint() {
                if let Err(err) = persistence.checkpoint(&committed) {
                    event!(Level::WARN, error = %err, "automatic checkpoint failed");
                }
            }
        }
        Ok(value)
    }

    /// Snapshot the committed tables and truncate the WAL.
    pub async fn checkpoint(&self) -> Result<()> {
        if let Some(persistence) = &self.persistence {
            let tables = self.tables.read().await;
            persistence.lock().await.checkpoint(&tables)?;
        }
        Ok(())
    }

    pub fn is_persistent(&self) -> bool {
        self.persistence.is_some()
    }

    pub async fn stats(&self) -> StoreStats {
        let tables = self.tables.read().await.counts();
        let wal_entries_since_checkpoint = match &self.persistence {
            Some(persistence) => persistence.lock().await.wal().entries_since_checkpoint(),
            None => 0,
        };
        StoreStats {
            tables,
            transactions: self.transactions.stats(),
            wal_entries_since_checkpoint,
        }
    }
}
