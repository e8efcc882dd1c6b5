//! Domain types with validation support.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Largest amount a single payment may credit: 10^15.
///
/// Keeps the per-account sums far inside the range `Decimal` can represent.
pub const MAX_CREDITS: Decimal = Decimal::from_parts(2_764_472_320, 232_830, 0, false, 0);

/// A portal account, identified by its stable subject identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub sub: String,
}

impl User {
    #[must_use]
    pub fn new(sub: impl Into<String>) -> Self {
        Self { sub: sub.into() }
    }
}

/// A processed payment. The id is the caller-supplied idempotency key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxnRecord {
    pub id: String,
    pub sub: String,
    /// Credits added by this payment
    pub amount: Decimal,
}

impl TxnRecord {
    #[must_use]
    pub fn new(id: impl Into<String>, sub: impl Into<String>, amount: Decimal) -> Self {
        Self {
            id: id.into(),
            sub: sub.into(),
            amount,
        }
    }
}

/// A subscription period paid for with credits.
///
/// The crediting flow never writes these; they only feed the spend side of a
/// balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendRecord {
    pub id: Uuid,
    pub sub: String,
    pub tier: i32,
    pub period_from: DateTime<Utc>,
    pub period_to: DateTime<Utc>,
    pub price: Decimal,
}

/// Raw aggregates behind a balance. `None` means there was nothing to sum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BalanceTotals {
    pub credited: Option<Decimal>,
    pub spent: Option<Decimal>,
}

/// Payment notification sent by a payment processor
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct PaymentRequest {
    /// Idempotency key of the external payment
    #[serde(rename = "txnID", default)]
    #[validate(length(min = 1, message = "missing or empty txn ID"))]
    #[schema(example = "0x9f2c4e...:0")]
    pub txn_id: String,
    /// Account to credit. Must contain a non-whitespace character, the same
    /// rule the balance query applies.
    #[serde(default)]
    #[validate(custom(function = "validate_sub"))]
    pub sub: String,
    /// Credits to add, already converted by the payment processor
    #[serde(with = "rust_decimal::serde::float")]
    #[validate(custom(function = "validate_positive_credits"))]
    #[schema(value_type = f64, example = 10.0)]
    pub credits: Decimal,
}

impl PaymentRequest {
    #[must_use]
    pub fn new(txn_id: impl Into<String>, sub: impl Into<String>, credits: Decimal) -> Self {
        Self {
            txn_id: txn_id.into(),
            sub: sub.into(),
            credits,
        }
    }
}

/// Whether `sub` names an account: blank subs are rejected on every path
#[must_use]
pub fn is_valid_sub(sub: &str) -> bool {
    !sub.trim().is_empty()
}

fn validate_sub(sub: &str) -> Result<(), validator::ValidationError> {
    if is_valid_sub(sub) {
        return Ok(());
    }
    let mut err = validator::ValidationError::new("length");
    err.message = Some("missing or empty sub".into());
    Err(err)
}

fn validate_positive_credits(credits: &Decimal) -> Result<(), validator::ValidationError> {
    if *credits <= Decimal::ZERO {
        let mut err = validator::ValidationError::new("range");
        err.message = Some("non-positive credits amount".into());
        return Err(err);
    }
    if *credits > MAX_CREDITS {
        let mut err = validator::ValidationError::new("range");
        err.message = Some(format!("credits amount exceeds {MAX_CREDITS}").into());
        return Err(err);
    }
    Ok(())
}

/// Balance of an account, derived from its ledger records
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct BalanceResponse {
    pub sub: String,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64, example = 10.0)]
    pub balance: Decimal,
}

/// Health check response. The flag, not the status code, carries the signal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct HealthResponse {
    /// Whether the store answered a liveness probe
    #[serde(rename = "dbAlive")]
    pub db_alive: bool,
}

/// Error body returned for every non-2xx response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable error message
    #[schema(example = "non-positive credits amount")]
    pub message: String,
}
