//! Test doubles for the ledger store.

pub mod mocks;

pub use mocks::{MockLedgerStore, MockUnitOfWork};
