//! Application service layer.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{instrument, warn};
use validator::Validate;

use crate::domain::{
    AppError, HealthResponse, LedgerStore, PaymentRequest, UnitOfWork, ValidationError,
    is_valid_sub,
};

use super::{balance, ledger};

/// Application service containing the ledger use cases
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
}

impl LedgerService {
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Decode and validate a payment notification. Pure, touches no storage.
    pub fn parse_payment(body: &[u8]) -> Result<PaymentRequest, AppError> {
        let payment: PaymentRequest = serde_json::from_slice(body).map_err(|e| {
            warn!(error = %e, "Malformed payment notification");
            AppError::Validation(ValidationError::MalformedBody(e.to_string()))
        })?;
        payment.validate().map_err(|e| {
            warn!(error = %e, "Validation failed");
            AppError::Validation(ValidationError::Multiple(e.to_string()))
        })?;
        Ok(payment)
    }

    /// Apply a validated payment inside the current unit of work
    pub async fn apply_payment(
        uow: &mut dyn UnitOfWork,
        payment: &PaymentRequest,
    ) -> Result<(), AppError> {
        ledger::credit_user(uow, &payment.sub, payment.credits, &payment.txn_id).await
    }

    /// Current balance of `sub`
    #[instrument(skip(self))]
    pub async fn user_balance(&self, sub: &str) -> Result<Decimal, AppError> {
        if !is_valid_sub(sub) {
            return Err(AppError::Validation(ValidationError::InvalidField {
                field: "sub".to_string(),
                message: "missing or empty sub".to_string(),
            }));
        }
        balance::user_balance(self.store.as_ref(), sub).await
    }

    /// Probe the store. Never fails; the result is carried in the body.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> HealthResponse {
        let db_alive = match self.store.health_check().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Store liveness probe failed");
                false
            }
        };
        HealthResponse { db_alive }
    }
}
