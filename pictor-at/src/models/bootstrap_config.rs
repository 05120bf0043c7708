//! Bootstrap configuration for pictor-at startup
//!
//! Two-stage database initialization:
//! - Stage 1: Bootstrap - Read restart-required parameters with minimal connection
//! - Stage 2: Production - Create configured pool based on Stage 1 parameters
//!
//! **Restart-required parameters:**
//! - `at_database_connection_pool_size` - Pool size for concurrent operations
//! - `at_database_lock_retry_ms` - SQLite busy_timeout per connection
//! - `at_database_max_lock_wait_ms` - Total retry budget for lock contention

use anyhow::{Context, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Bootstrap configuration read from settings table at startup
///
/// **Lifecycle:**
/// 1. Read from database via single-connection bootstrap pool
/// 2. Bootstrap pool closed
/// 3. Production pool created using these parameters
#[derive(Debug, Clone)]
pub struct AtBootstrapConfig {
    /// Database connection pool size
    ///
    /// **Default:** 32 connections
    pub connection_pool_size: u32,

    /// SQLite busy_timeout - time to wait for lock before error
    ///
    /// **Default:** 250 ms
    /// **Applied:** Per-connection PRAGMA on all pool connections
    pub lock_retry_ms: u64,

    /// Maximum total retry time for database operations
    ///
    /// **Default:** 5000 ms
    /// **Purpose:** Total retry budget before giving up
    pub max_lock_wait_ms: u64,
}

impl AtBootstrapConfig {
    /// Read restart-required parameters from database (Stage 1)
    ///
    /// Missing parameters fall back to compiled defaults; invalid values
    /// return an error (fail-fast on misconfiguration).
    pub async fn from_database(db_path: &Path) -> Result<Self> {
        tracing::debug!("Creating bootstrap connection to read restart-required parameters");

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(
                SqliteConnectOptions::from_str(
                    db_path.to_str().context("Invalid database path")?,
                )
                .context("Failed to parse database path")?
                .create_if_missing(true),
            )
            .await
            .context("Failed to create bootstrap database connection")?;

        // Settings table may not exist yet on first start
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("Failed to ensure settings table exists")?;

        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(
                    (SELECT value FROM settings WHERE key = 'at_database_connection_pool_size'),
                    '32'
                ) as pool_size,
                COALESCE(
                    (SELECT value FROM settings WHERE key = 'at_database_lock_retry_ms'),
                    '250'
                ) as lock_retry,
                COALESCE(
                    (SELECT value FROM settings WHERE key = 'at_database_max_lock_wait_ms'),
                    '5000'
                ) as max_wait
            "#,
        )
        .fetch_one(&pool)
        .await
        .context("Failed to read restart-required parameters from settings table")?;

        let pool_size_str: String = row
            .try_get("pool_size")
            .context("Failed to get pool_size from query result")?;
        let connection_pool_size: u32 = pool_size_str
            .parse()
            .context("Invalid at_database_connection_pool_size (must be integer 1-500)")?;

        let lock_retry_str: String = row
            .try_get("lock_retry")
            .context("Failed to get lock_retry from query result")?;
        let lock_retry_ms: u64 = lock_retry_str
            .parse()
            .context("Invalid at_database_lock_retry_ms (must be integer 50-5000)")?;

        let max_wait_str: String = row
            .try_get("max_wait")
            .context("Failed to get max_wait from query result")?;
        let max_lock_wait_ms: u64 = max_wait_str
            .parse()
            .context("Invalid at_database_max_lock_wait_ms (must be integer 500-30000)")?;

        // Close bootstrap pool before returning
        pool.close().await;
        tracing::debug!("Bootstrap connection closed");

        Ok(Self {
            connection_pool_size,
            lock_retry_ms,
            max_lock_wait_ms,
        })
    }

    /// Create production database pool from bootstrap config (Stage 2)
    ///
    /// **Pool Configuration:**
    /// - Max connections: From `connection_pool_size` parameter
    /// - Acquire timeout: From `max_lock_wait_ms` parameter
    /// - Per-connection PRAGMA: busy_timeout, journal_mode, synchronous
    pub async fn create_pool(&self, db_path: &Path) -> Result<SqlitePool> {
        tracing::debug!(
            "Creating production database pool: {} connections, busy_timeout={}ms",
            self.connection_pool_size,
            self.lock_retry_ms
        );

        let pool = SqlitePoolOptions::new()
            .max_connections(self.connection_pool_size)
            .acquire_timeout(Duration::from_millis(self.max_lock_wait_ms))
            .connect_with(
                SqliteConnectOptions::from_str(
                    db_path.to_str().context("Invalid database path")?,
                )
                .context("Failed to parse database path")?
                .busy_timeout(Duration::from_millis(self.lock_retry_ms))
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .create_if_missing(true),
            )
            .await
            .context("Failed to create production database pool")?;

        tracing::info!(
            "Production database pool ready: {} connections, busy_timeout={}ms",
            self.connection_pool_size,
            self.lock_retry_ms
        );

        Ok(pool)
    }
}
