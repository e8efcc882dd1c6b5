//! Domain layer containing core business types, traits, and error definitions.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{AppError, ConfigError, DatabaseError, ValidationError};
pub use traits::{BalanceReader, LedgerStore, UnitOfWork};
pub use types::{
    BalanceResponse, BalanceTotals, ErrorResponse, HealthResponse, MAX_CREDITS, PaymentRequest,
    SpendRecord, TxnRecord, User, is_valid_sub,
};
