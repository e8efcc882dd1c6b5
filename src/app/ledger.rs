//! Ledger mutations executed inside a caller-supplied unit of work.

use rust_decimal::Decimal;
use tracing::{debug, info, instrument};

use crate::domain::{AppError, TxnRecord, UnitOfWork, User};

/// Credit `amount` to `sub` and mark `txn_id` as processed.
///
/// Replaying an already processed `txn_id` is a no-op that succeeds. Any
/// other failure is returned unchanged so the caller aborts the whole unit of
/// work; nothing written through `uow` survives an abort.
///
/// The caller has already checked that `amount` is positive and that `sub`
/// and `txn_id` are non-empty.
#[instrument(skip(uow), fields(%sub, %amount, %txn_id))]
pub async fn credit_user(
    uow: &mut dyn UnitOfWork,
    sub: &str,
    amount: Decimal,
    txn_id: &str,
) -> Result<(), AppError> {
    match uow.insert_user(&User::new(sub)).await {
        Ok(()) => debug!("Created user"),
        Err(e) if e.is_duplicate() => {}
        Err(e) => return Err(e),
    }

    match uow.insert_txn(&TxnRecord::new(txn_id, sub, amount)).await {
        Ok(()) => {
            info!("Credited user");
            Ok(())
        }
        Err(e) if e.is_duplicate() => {
            info!("Payment already processed, ignoring replay");
            Ok(())
        }
        Err(e) => Err(e),
    }
}
