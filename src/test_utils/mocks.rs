//! Mock implementations for testing.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::domain::{
    AppError, BalanceReader, BalanceTotals, DatabaseError, LedgerStore, SpendRecord, TxnRecord,
    UnitOfWork, User,
};

/// Data visible to every unit of work
#[derive(Debug, Default)]
struct Committed {
    users: HashSet<String>,
    txns: Vec<TxnRecord>,
    spends: Vec<SpendRecord>,
}

impl Committed {
    fn has_txn(&self, id: &str) -> bool {
        self.txns.iter().any(|t| t.id == id)
    }
}

#[derive(Debug, Default)]
struct Shared {
    committed: Mutex<Committed>,
    is_unhealthy: AtomicBool,
    fail_begin: AtomicBool,
    always_conflict: AtomicBool,
    pending_conflicts: AtomicUsize,
    write_failure: Mutex<Option<String>>,
    begins: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

/// In-memory ledger store for testing.
///
/// Units of work stage their writes and validate them optimistically at
/// commit: if another unit committed the same user or txn in the meantime,
/// the commit reports a write conflict, the way a serializable database
/// would.
#[derive(Debug, Clone, Default)]
pub struct MockLedgerStore {
    shared: Arc<Shared>,
}

impl MockLedgerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Unhealthy stores fail liveness probes, balance reads and `begin`
    pub fn set_healthy(&self, healthy: bool) {
        self.shared.is_unhealthy.store(!healthy, Ordering::Relaxed);
    }

    pub fn fail_begin(&self, fail: bool) {
        self.shared.fail_begin.store(fail, Ordering::Relaxed);
    }

    /// Make the next `count` commits report a write conflict
    pub fn inject_conflicts(&self, count: usize) {
        self.shared.pending_conflicts.store(count, Ordering::SeqCst);
    }

    /// Make every commit report a write conflict
    pub fn always_conflict(&self, conflict: bool) {
        self.shared.always_conflict.store(conflict, Ordering::SeqCst);
    }

    /// Make every insert fail with a query error
    pub fn fail_writes(&self, message: impl Into<String>) {
        *self.shared.write_failure.lock().unwrap() = Some(message.into());
    }

    /// Add a spend record directly to the committed state
    pub fn seed_spend(&self, spend: SpendRecord) {
        self.shared.committed.lock().unwrap().spends.push(spend);
    }

    pub fn has_user(&self, sub: &str) -> bool {
        self.shared.committed.lock().unwrap().users.contains(sub)
    }

    /// Committed txns in commit order
    pub fn committed_txns(&self) -> Vec<TxnRecord> {
        self.shared.committed.lock().unwrap().txns.clone()
    }

    pub fn begin_count(&self) -> usize {
        self.shared.begins.load(Ordering::SeqCst)
    }

    pub fn commit_count(&self) -> usize {
        self.shared.commits.load(Ordering::SeqCst)
    }

    /// Aborted, failed-to-commit and dropped units of work
    pub fn rollback_count(&self) -> usize {
        self.shared.rollbacks.load(Ordering::SeqCst)
    }

    fn check_healthy(&self) -> Result<(), AppError> {
        if self.shared.is_unhealthy.load(Ordering::Relaxed) {
            return Err(AppError::Database(DatabaseError::Connection(
                "Unhealthy".to_string(),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl BalanceReader for MockLedgerStore {
    async fn balance_totals(&self, sub: &str) -> Result<BalanceTotals, AppError> {
        self.check_healthy()?;
        let committed = self.shared.committed.lock().unwrap();
        let credited = checked_sum(
            committed
                .txns
                .iter()
                .filter(|t| t.sub == sub)
                .map(|t| t.amount),
        )?;
        let spent = checked_sum(
            committed
                .spends
                .iter()
                .filter(|s| s.sub == sub)
                .map(|s| s.price),
        )?;
        Ok(BalanceTotals { credited, spent })
    }
}

/// SQL `SUM` semantics: `None` over no rows, an error when the total does not
/// fit in a `Decimal`
fn checked_sum(
    mut amounts: impl Iterator<Item = Decimal>,
) -> Result<Option<Decimal>, AppError> {
    amounts.try_fold(None, |total: Option<Decimal>, amount| {
        total
            .unwrap_or(Decimal::ZERO)
            .checked_add(amount)
            .map(Some)
            .ok_or_else(|| {
                AppError::Database(DatabaseError::Query("numeric overflow in SUM".to_string()))
            })
    })
}

#[async_trait]
impl LedgerStore for MockLedgerStore {
    async fn health_check(&self) -> Result<(), AppError> {
        self.check_healthy()
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, AppError> {
        self.shared.begins.fetch_add(1, Ordering::SeqCst);
        self.check_healthy()?;
        if self.shared.fail_begin.load(Ordering::Relaxed) {
            return Err(AppError::Database(DatabaseError::Transaction(
                "Mock begin failure".to_string(),
            )));
        }
        Ok(Box::new(MockUnitOfWork {
            shared: Arc::clone(&self.shared),
            users: Vec::new(),
            txns: Vec::new(),
            finished: false,
        }))
    }
}

/// Unit of work over [`MockLedgerStore`] with staged writes
pub struct MockUnitOfWork {
    shared: Arc<Shared>,
    users: Vec<String>,
    txns: Vec<TxnRecord>,
    finished: bool,
}

impl MockUnitOfWork {
    fn check_write(&self) -> Result<(), AppError> {
        match self.shared.write_failure.lock().unwrap().as_ref() {
            Some(msg) => Err(AppError::Database(DatabaseError::Query(msg.clone()))),
            None => Ok(()),
        }
    }

    fn take_injected_conflict(&self) -> bool {
        self.shared.always_conflict.load(Ordering::SeqCst)
            || self
                .shared
                .pending_conflicts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
    }

    fn rolled_back(&mut self) {
        self.finished = true;
        self.shared.rollbacks.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl UnitOfWork for MockUnitOfWork {
    async fn insert_user(&mut self, user: &User) -> Result<(), AppError> {
        self.check_write()?;
        let exists = self.users.contains(&user.sub)
            || self.shared.committed.lock().unwrap().users.contains(&user.sub);
        if exists {
            return Err(AppError::Database(DatabaseError::Duplicate(format!(
                "user {}",
                user.sub
            ))));
        }
        self.users.push(user.sub.clone());
        Ok(())
    }

    async fn insert_txn(&mut self, txn: &TxnRecord) -> Result<(), AppError> {
        self.check_write()?;
        let exists = self.txns.iter().any(|t| t.id == txn.id)
            || self.shared.committed.lock().unwrap().has_txn(&txn.id);
        if exists {
            return Err(AppError::Database(DatabaseError::Duplicate(format!(
                "txn {}",
                txn.id
            ))));
        }
        self.txns.push(txn.clone());
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), AppError> {
        if self.take_injected_conflict() {
            self.rolled_back();
            return Err(AppError::Database(DatabaseError::WriteConflict(
                "injected conflict".to_string(),
            )));
        }

        let shared = Arc::clone(&self.shared);
        let mut committed = shared.committed.lock().unwrap();
        let lost_race = self.users.iter().any(|u| committed.users.contains(u))
            || self.txns.iter().any(|t| committed.has_txn(&t.id));
        if lost_race {
            drop(committed);
            self.rolled_back();
            return Err(AppError::Database(DatabaseError::WriteConflict(
                "concurrent unit of work committed first".to_string(),
            )));
        }

        committed.users.extend(self.users.drain(..));
        committed.txns.append(&mut self.txns);
        drop(committed);
        self.finished = true;
        self.shared.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn abort(mut self: Box<Self>) -> Result<(), AppError> {
        self.rolled_back();
        Ok(())
    }
}

impl Drop for MockUnitOfWork {
    fn drop(&mut self) {
        if !self.finished {
            self.shared.rollbacks.fetch_add(1, Ordering::SeqCst);
        }
    }
}
