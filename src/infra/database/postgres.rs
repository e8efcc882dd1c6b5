//! PostgreSQL ledger store implementation.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgPoolOptions};
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::domain::{
    AppError, BalanceReader, BalanceTotals, DatabaseError, LedgerStore, TxnRecord, UnitOfWork,
    User,
};

/// PostgreSQL connection pool configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(3),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

/// PostgreSQL ledger store with connection pooling
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Create a new PostgreSQL client with custom configuration
    pub async fn new(database_url: &str, config: PostgresConfig) -> Result<Self, AppError> {
        info!("Connecting to PostgreSQL...");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect(database_url)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;
        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Run database migrations using sqlx migrate
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Migration(e.to_string())))?;
        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Close all pooled connections
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Get the underlying connection pool (for testing)
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl BalanceReader for PostgresClient {
    #[instrument(skip(self))]
    async fn balance_totals(&self, sub: &str) -> Result<BalanceTotals, AppError> {
        // SUM over no rows is NULL, which maps to None
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT SUM(amount) FROM txns WHERE sub = $1) AS credited,
                (SELECT SUM(price) FROM subscriptions WHERE sub = $1) AS spent
            "#,
        )
        .bind(sub)
        .fetch_one(&self.pool)
        .await?;

        Ok(BalanceTotals {
            credited: row.try_get::<Option<Decimal>, _>("credited")?,
            spent: row.try_get::<Option<Decimal>, _>("spent")?,
        })
    }
}

#[async_trait]
impl LedgerStore for PostgresClient {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(DatabaseError::Transaction(e.to_string())))?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Transaction(e.to_string())))?;
        debug!("Began serializable transaction");
        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

/// A serializable Postgres transaction.
///
/// sqlx rolls the transaction back when it is dropped without a commit.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    // ON CONFLICT keeps the transaction usable after a duplicate; a plain
    // unique violation would poison every later statement in it.
    #[instrument(skip(self, user), fields(sub = %user.sub))]
    async fn insert_user(&mut self, user: &User) -> Result<(), AppError> {
        let result =
            sqlx::query("INSERT INTO users (sub) VALUES ($1) ON CONFLICT (sub) DO NOTHING")
                .bind(&user.sub)
                .execute(&mut *self.tx)
                .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::Database(DatabaseError::Duplicate(format!(
                "user {}",
                user.sub
            ))));
        }
        Ok(())
    }

    #[instrument(skip(self, txn), fields(id = %txn.id, sub = %txn.sub))]
    async fn insert_txn(&mut self, txn: &TxnRecord) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO txns (id, sub, amount)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&txn.id)
        .bind(&txn.sub)
        .bind(txn.amount)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::Database(DatabaseError::Duplicate(format!(
                "txn {}",
                txn.id
            ))));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let Self { tx } = *self;
        tx.commit().await?;
        Ok(())
    }

    async fn abort(self: Box<Self>) -> Result<(), AppError> {
        let Self { tx } = *self;
        tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_config_default() {
        let config = PostgresConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.acquire_timeout, Duration::from_secs(3));
        assert_eq!(config.idle_timeout, Duration::from_secs(600));
        assert_eq!(config.max_lifetime, Duration::from_secs(1800));
    }
}
