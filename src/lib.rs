//! Credit ledger service: payment notifications in, idempotent credits out.

pub mod api;
pub mod app;
pub mod config;
pub mod domain;
pub mod infra;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
