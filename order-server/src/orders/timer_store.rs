//! redb-based durable timer store
//!
//! 订单的延时状态转换（现金单自动确认、数字单支付倒计时）落盘在这里，
//! 进程重启后到期的定时器依然会被 reconcile 捡起。
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `timers` | `(namespace, order_id)` | `TimerEntry` (JSON) | 活跃定时器，一单一命名空间至多一条 |
//! | `due_index` | `(due_at, namespace, order_id)` | `()` | 按到期时间排序的索引 |
//!
//! Reconciliation reads the due-index with a range scan, so each tick costs
//! proportional to the number of DUE entries, not the total armed timers.
//!
//! # TTL
//!
//! Every entry carries an `expires_at` slightly past its `due_at`. Entries the
//! reconcile loop could not act on (persistent handler failure) are purged
//! once expired, so the store self-cleans like the TTL of a KV store would.
//!
//! Note: redb operations are synchronous for stability.

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Active timers: key = (namespace, order_id), value = JSON-serialized TimerEntry
const TIMERS_TABLE: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("timers");

/// Due-time index: key = (due_at millis, namespace, order_id), value = empty
const DUE_INDEX_TABLE: TableDefinition<(i64, &str, &str), ()> = TableDefinition::new("due_index");

/// Timer namespaces (one per deferred transition kind)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimerNamespace {
    /// Cash orders: auto-confirm once the window elapses
    #[serde(rename = "order_confirmation")]
    OrderConfirmation,
    /// Digital orders: auto-cancel when payment never arrives
    #[serde(rename = "digital_order_countdown")]
    DigitalOrderCountdown,
}

impl TimerNamespace {
    pub const ALL: [TimerNamespace; 2] = [
        TimerNamespace::OrderConfirmation,
        TimerNamespace::DigitalOrderCountdown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimerNamespace::OrderConfirmation => "order_confirmation",
            TimerNamespace::DigitalOrderCountdown => "digital_order_countdown",
        }
    }
}

impl std::fmt::Display for TimerNamespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An armed timer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerEntry {
    pub order_id: String,
    pub namespace: TimerNamespace,
    /// Absolute due time (Unix millis)
    pub due_at: i64,
    /// Safety-net expiry, somewhat past `due_at` (Unix millis)
    pub expires_at: i64,
}

#[derive(Debug, Error)]
pub enum TimerStoreError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type TimerStoreResult<T> = Result<T, TimerStoreError>;

/// Durable timer store backed by redb
///
/// redb commits with `Durability::Immediate`, so an armed timer survives
/// power loss as soon as `arm` returns.
#[derive(Clone)]
pub struct TimerStore {
    db: Arc<Database>,
}

impl TimerStore {
    /// Open or create the store at the given path
    pub fn open(path: impl AsRef<Path>) -> TimerStoreResult<Self> {
        let db = Database::create(path)?;

        // Create tables if they don't exist
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(TIMERS_TABLE)?;
            let _ = write_txn.open_table(DUE_INDEX_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Arm a timer for `(namespace, order_id)`.
    ///
    /// Replaces any existing entry for the same pair, so at most one timer is
    /// active per order per namespace.
    pub fn arm(
        &self,
        namespace: TimerNamespace,
        order_id: &str,
        due_at: i64,
        expires_at: i64,
    ) -> TimerStoreResult<()> {
        let entry = TimerEntry {
            order_id: order_id.to_string(),
            namespace,
            due_at,
            expires_at,
        };
        let value = serde_json::to_vec(&entry)?;

        let txn = self.db.begin_write()?;
        {
            let mut timers = txn.open_table(TIMERS_TABLE)?;
            let mut index = txn.open_table(DUE_INDEX_TABLE)?;

            // Drop the index row of a previous entry before overwriting
            if let Some(old) = timers.get((namespace.as_str(), order_id))? {
                let old_entry: TimerEntry = serde_json::from_slice(old.value())?;
                index.remove((old_entry.due_at, namespace.as_str(), order_id))?;
            }

            timers.insert((namespace.as_str(), order_id), value.as_slice())?;
            index.insert((due_at, namespace.as_str(), order_id), ())?;
        }
        txn.commit()?;

        tracing::debug!(order_id = %order_id, namespace = %namespace, due_at, "Timer armed");
        Ok(())
    }

    /// Disarm all timers of an order (both namespaces, unconditionally).
    ///
    /// Idempotent: disarming an order with no active timer is a no-op.
    pub fn disarm(&self, order_id: &str) -> TimerStoreResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut timers = txn.open_table(TIMERS_TABLE)?;
            let mut index = txn.open_table(DUE_INDEX_TABLE)?;

            for namespace in TimerNamespace::ALL {
                if let Some(old) = timers.remove((namespace.as_str(), order_id))? {
                    let old_entry: TimerEntry = serde_json::from_slice(old.value())?;
                    index.remove((old_entry.due_at, namespace.as_str(), order_id))?;
                }
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Dispose a single entry after it has been acted on
    pub fn dispose(&self, entry: &TimerEntry) -> TimerStoreResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut timers = txn.open_table(TIMERS_TABLE)?;
            let mut index = txn.open_table(DUE_INDEX_TABLE)?;
            timers.remove((entry.namespace.as_str(), entry.order_id.as_str()))?;
            index.remove((
                entry.due_at,
                entry.namespace.as_str(),
                entry.order_id.as_str(),
            ))?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Look up the active timer of `(namespace, order_id)`, if any
    pub fn get(
        &self,
        namespace: TimerNamespace,
        order_id: &str,
    ) -> TimerStoreResult<Option<TimerEntry>> {
        let txn = self.db.begin_read()?;
        let timers = txn.open_table(TIMERS_TABLE)?;
        match timers.get((namespace.as_str(), order_id))? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// All entries due at or before `now`, ordered by due time.
    ///
    /// Sorted-index range scan: cost is proportional to the due entries of
    /// this tick, not to the total number of armed timers.
    pub fn due_entries(&self, now: i64) -> TimerStoreResult<Vec<TimerEntry>> {
        let txn = self.db.begin_read()?;
        let timers = txn.open_table(TIMERS_TABLE)?;
        let index = txn.open_table(DUE_INDEX_TABLE)?;

        let upper = (now.saturating_add(1), "", "");
        let mut due = Vec::new();
        for row in index.range(..upper)? {
            let (key, _) = row?;
            let (_, namespace, order_id) = key.value();
            // The index row is authoritative for ordering; the entry itself
            // lives in the timers table
            if let Some(guard) = timers.get((namespace, order_id))? {
                due.push(serde_json::from_slice(guard.value())?);
            }
        }
        Ok(due)
    }

    /// Purge entries whose TTL expired (safety net for entries the reconcile
    /// loop repeatedly failed to act on). Returns the number removed.
    pub fn purge_expired(&self, now: i64) -> TimerStoreResult<usize> {
        let txn = self.db.begin_write()?;
        let purged = {
            let mut timers = txn.open_table(TIMERS_TABLE)?;
            let mut index = txn.open_table(DUE_INDEX_TABLE)?;

            // Collect first (can't iterate and mutate simultaneously)
            let mut expired: Vec<TimerEntry> = Vec::new();
            for row in timers.iter()? {
                let (_, value) = row?;
                let entry: TimerEntry = serde_json::from_slice(value.value())?;
                if entry.expires_at <= now {
                    expired.push(entry);
                }
            }

            for entry in &expired {
                timers.remove((entry.namespace.as_str(), entry.order_id.as_str()))?;
                index.remove((
                    entry.due_at,
                    entry.namespace.as_str(),
                    entry.order_id.as_str(),
                ))?;
            }
            expired.len()
        };
        txn.commit()?;
        Ok(purged)
    }
}
