//! Database adapters.

pub mod postgres;

pub use postgres::{PgUnitOfWork, PostgresClient, PostgresConfig};
