//! Application layer containing business logic and shared state.

pub mod balance;
pub mod ledger;
pub mod service;
pub mod state;

pub use balance::user_balance;
pub use ledger::credit_user;
pub use service::LedgerService;
pub use state::{AppState, RetryPolicy};
