//! # Database Pool Management
//!
//! SQLite connection pool setup for the cart engine.
//!
//! Every mutation request checks one connection out of the pool, runs its
//! whole transaction on it, and returns it - there is no connection shared
//! between requests and no state outside the database.
//!
//! ## Why WAL Matters Here
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  WAL journal mode                                                       │
//! │                                                                         │
//! │  readers (snapshots, health)  ──►  never blocked by the writer          │
//! │                                                                         │
//! │  writers (cart mutations)     ──►  serialized on ONE write lock         │
//! │                                    ▲                                    │
//! │                                    └─ this serialization is the         │
//! │                                       backstop for tier-sibling price   │
//! │                                       rewrites: two mutations can       │
//! │                                       never interleave their            │
//! │                                       read-recompute-write              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A mutation that waits on the write lock past `busy_timeout` fails with
//! the retryable [`DbError::Busy`] rather than hanging the request.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::migrations;

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/merx/merx.db")
///     .max_connections(5)
///     .allow_backorder(false);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file, created on first connect.
    pub database_path: PathBuf,

    /// Maximum number of pooled connections. Default: 5.
    pub max_connections: u32,

    /// Connections kept alive when idle. Default: 1.
    pub min_connections: u32,

    /// How long acquiring a pooled connection may take. Default: 30s.
    pub connect_timeout: Duration,

    /// How long a statement waits on the SQLite write lock before failing
    /// with the retryable busy error. Default: 5s.
    pub busy_timeout: Duration,

    /// Idle timeout before a pooled connection is closed. Default: 10min.
    pub idle_timeout: Duration,

    /// Apply pending migrations on connect. Default: true.
    pub run_migrations: bool,

    /// Whether cart reservations may drive stock below zero.
    /// Default: true (backorder-style oversell allowed).
    pub allow_backorder: bool,
}

impl DbConfig {
    /// Configuration with defaults for the given database path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
            allow_backorder: true,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection acquire timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the SQLite busy timeout.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Sets whether stock may go negative under cart reservations.
    pub fn allow_backorder(mut self, allow: bool) -> Self {
        self.allow_backorder = allow;
        self
    }

    /// In-memory database for tests: isolated, migrated, gone on drop.
    ///
    /// The pool is pinned to a single connection - every pooled connection
    /// would otherwise open its own private in-memory database.
    pub fn in_memory() -> Self {
        DbConfig {
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(1),
            idle_timeout: Duration::from_secs(60),
            ..DbConfig::new(":memory:")
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle.
///
/// Cheap to clone (the pool is an Arc internally); owns the stock policy
/// flag so every mutation sees one consistent backorder setting.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,

    /// Stock floor policy for cart reservations.
    allow_backorder: bool,
}

impl Database {
    /// Opens (creating if missing) and migrates the database, returning a
    /// pooled handle.
    ///
    /// SQLite is configured the same way in every environment: WAL journal
    /// (readers never block the writer), NORMAL synchronous, foreign keys
    /// on, and the busy timeout from the config.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        let connect_options = SqliteConnectOptions::new()
            .filename(&config.database_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // off by default in SQLite for backwards compatibility
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            allow_backorder = config.allow_backorder,
            "Database pool created"
        );

        let db = Database {
            pool,
            allow_backorder: config.allow_backorder,
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Applies pending migrations. Idempotent; called by [`Database::new`]
    /// unless disabled in the config.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// The underlying connection pool, for transactions and ad-hoc queries.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Whether cart reservations may drive stock below zero.
    pub fn allow_backorder(&self) -> bool {
        self.allow_backorder
    }

    /// Closes the pool; subsequent operations fail.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// True when the database answers a trivial query.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database_migrates_and_answers() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        assert!(db.health_check().await);
        assert!(db.allow_backorder());

        let status = migrations::migration_status(db.pool()).await.unwrap();
        assert_eq!(status.pending(), 0);
        assert!(status.applied >= 1);
    }

    #[tokio::test]
    async fn test_config_builder() {
        let config = DbConfig::new("/tmp/test.db")
            .max_connections(10)
            .min_connections(2)
            .busy_timeout(Duration::from_millis(250))
            .allow_backorder(false);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
        assert!(!config.allow_backorder);
    }

    #[tokio::test]
    async fn test_closed_pool_fails_health_check() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.close().await;

        assert!(!db.health_check().await);
    }
}
