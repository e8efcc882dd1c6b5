//! Domain traits defining contracts for the backing store.

use async_trait::async_trait;

use super::error::AppError;
use super::types::{BalanceTotals, TxnRecord, User};

/// One atomic unit of work against the store.
///
/// Every read and write made through the handle commits or aborts together.
/// Dropping a handle that was never ended must roll its writes back, so an
/// attempt that is cancelled mid-flight leaves nothing behind.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Insert a user. Reports `DatabaseError::Duplicate` if the sub exists.
    async fn insert_user(&mut self, user: &User) -> Result<(), AppError>;

    /// Insert a transaction record. Reports `DatabaseError::Duplicate` if the
    /// id has already been recorded.
    async fn insert_txn(&mut self, txn: &TxnRecord) -> Result<(), AppError>;

    /// Make all writes of this unit durable. May report
    /// `DatabaseError::WriteConflict` when a concurrent unit won.
    async fn commit(self: Box<Self>) -> Result<(), AppError>;

    /// Discard all writes of this unit.
    async fn abort(self: Box<Self>) -> Result<(), AppError>;
}

/// Read access to the aggregates a balance is derived from
#[async_trait]
pub trait BalanceReader: Send + Sync {
    /// Credited and spent totals of `sub`, read in one statement
    async fn balance_totals(&self, sub: &str) -> Result<BalanceTotals, AppError>;
}

/// The ledger store: liveness, unit-of-work factory and balance reads
#[async_trait]
pub trait LedgerStore: BalanceReader {
    /// Check store connectivity
    async fn health_check(&self) -> Result<(), AppError>;

    /// Open a new unit of work scoped to one request attempt
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, AppError>;
}
