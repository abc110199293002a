//! # Database Migrations
//!
//! The schema ships embedded in the binary: `sqlx::migrate!` picks up every
//! SQL file under `migrations/sqlite/` at compile time, so a deployment is
//! never missing its migration files. [`crate::pool::Database::new`] applies
//! pending migrations on connect unless the config disables it.
//!
//! Adding a migration: drop a new `NNN_description.sql` next to the existing
//! ones, numbered after the highest. Applied migrations are checksummed in
//! `_sqlx_migrations` - editing one after it shipped fails validation on the
//! next startup, so always add rather than amend.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// How far along the schema is, for diagnostics and health endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Migrations embedded in this binary.
    pub total: usize,

    /// Migrations recorded as applied in the database.
    pub applied: usize,
}

impl MigrationStatus {
    /// Migrations this binary would apply on the next run.
    pub fn pending(&self) -> usize {
        self.total.saturating_sub(self.applied)
    }
}

/// Applies all pending migrations, in filename order, each in its own
/// transaction. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    MIGRATOR.run(pool).await?;

    info!(
        migrations = MIGRATOR.migrations.len(),
        "Schema migrations up to date"
    );
    Ok(())
}

/// Reports embedded-vs-applied migration counts.
///
/// A database that predates the migrations table reports zero applied.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<MigrationStatus> {
    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .unwrap_or(0);

    Ok(MigrationStatus {
        total: MIGRATOR.migrations.len(),
        applied: applied as usize,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_schema_is_embedded() {
        assert!(!MIGRATOR.migrations.is_empty());
        assert!(MIGRATOR
            .migrations
            .iter()
            .any(|m| m.description.contains("initial schema")));
    }

    #[test]
    fn test_pending_never_underflows() {
        let status = MigrationStatus {
            total: 1,
            applied: 3,
        };
        assert_eq!(status.pending(), 0);
    }
}
