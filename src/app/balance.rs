//! Balance derivation from ledger records.

use rust_decimal::Decimal;
use tracing::{debug, instrument};

use crate::domain::{AppError, BalanceReader, BalanceTotals};

/// Balance of `sub`: everything ever credited minus everything ever spent.
///
/// Balances are never stored. A sub without records has a balance of zero.
#[instrument(skip(reader))]
pub async fn user_balance<R>(reader: &R, sub: &str) -> Result<Decimal, AppError>
where
    R: BalanceReader + ?Sized,
{
    let totals = reader.balance_totals(sub).await.map_err(|e| {
        AppError::Internal(format!("failed to calculate the balance of {sub}: {e}"))
    })?;
    let balance = net_balance(totals).ok_or_else(|| {
        AppError::Internal(format!("balance of {sub} is out of range"))
    })?;
    debug!(%balance, "Calculated balance");
    Ok(balance)
}

/// Absent aggregates count as zero. `None` when the difference overflows.
fn net_balance(totals: BalanceTotals) -> Option<Decimal> {
    let credited = totals.credited.unwrap_or(Decimal::ZERO);
    let spent = totals.spent.unwrap_or(Decimal::ZERO);
    credited.checked_sub(spent)
}
