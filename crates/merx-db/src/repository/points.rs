//! # Affiliate Point Ledger
//!
//! Per-(client, organization) point balances plus the append-only
//! transaction log.
//!
//! ## Reserve Semantics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Point Reservation                                  │
//! │                                                                         │
//! │  reserve(client, org, 10)                                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Lazily create zero balance row (first touch)                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  UPDATE ... SET points_current = points_current - 10,                   │
//! │               points_spent  = points_spent  + 10                        │
//! │  WHERE ... AND points_current >= 10     ← check and decrement are       │
//! │       │                                   ONE statement                 │
//! │       ├── rows_affected = 1 → append 'spend' log entry (-10)            │
//! │       └── rows_affected = 0 → Insufficient { available }                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The conditional UPDATE makes the balance check and the decrement a single
//! atomic statement inside the caller's write transaction - two concurrent
//! mutations by the same client can never both pass the check against a
//! stale balance. `points_current >= 0` stays invariant, backed by the
//! schema CHECK as the last line of defense.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use merx_core::PointAction;

/// A client's spendable balance within one organization.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PointBalance {
    pub client_id: String,
    pub organization_id: String,
    pub points_current: i64,
    pub points_spent: i64,
}

/// Result of a reservation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// Points were reserved and logged.
    Applied,
    /// The spendable balance cannot cover the reservation.
    Insufficient { available: i64 },
}

/// Makes sure the balance row exists (zero balance on first touch).
async fn ensure_balance_row(
    conn: &mut SqliteConnection,
    client_id: &str,
    organization_id: &str,
) -> DbResult<()> {
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO affiliate_point_balances (
            client_id, organization_id, points_current, points_spent,
            created_at, updated_at
        ) VALUES (?1, ?2, 0, 0, ?3, ?3)
        ON CONFLICT(client_id, organization_id) DO NOTHING
        "#,
    )
    .bind(client_id)
    .bind(organization_id)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(())
}

/// Reserves (spends) points against the client's balance.
///
/// On success decrements `points_current`, increments `points_spent`, and
/// appends a `spend` log entry with a negative delta. On insufficient
/// balance nothing is written and the caller is expected to roll the whole
/// transaction back.
pub async fn reserve(
    conn: &mut SqliteConnection,
    client_id: &str,
    organization_id: &str,
    points: i64,
    description: &str,
) -> DbResult<ReserveOutcome> {
    ensure_balance_row(&mut *conn, client_id, organization_id).await?;

    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE affiliate_point_balances SET
            points_current = points_current - ?3,
            points_spent = points_spent + ?3,
            updated_at = ?4
        WHERE client_id = ?1
          AND organization_id = ?2
          AND points_current >= ?3
        "#,
    )
    .bind(client_id)
    .bind(organization_id)
    .bind(points)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        // The row exists (ensured above); the guard refused the decrement.
        let available = get_balance(&mut *conn, client_id, organization_id)
            .await?
            .map(|b| b.points_current)
            .unwrap_or(0);

        debug!(client_id = %client_id, points, available, "Point reservation refused");
        return Ok(ReserveOutcome::Insufficient { available });
    }

    append_log(
        conn,
        client_id,
        organization_id,
        -points,
        PointAction::Spend,
        description,
    )
    .await?;

    debug!(client_id = %client_id, points, "Reserved points");
    Ok(ReserveOutcome::Applied)
}

/// Refunds (credits back) points to the client's balance.
///
/// Increments `points_current`, decrements `points_spent` floored at zero,
/// and appends a `refund` log entry with a positive delta.
pub async fn refund(
    conn: &mut SqliteConnection,
    client_id: &str,
    organization_id: &str,
    points: i64,
    description: &str,
) -> DbResult<()> {
    ensure_balance_row(&mut *conn, client_id, organization_id).await?;

    let now = Utc::now();

    sqlx::query(
        r#"
        UPDATE affiliate_point_balances SET
            points_current = points_current + ?3,
            points_spent = MAX(points_spent - ?3, 0),
            updated_at = ?4
        WHERE client_id = ?1 AND organization_id = ?2
        "#,
    )
    .bind(client_id)
    .bind(organization_id)
    .bind(points)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    append_log(
        conn,
        client_id,
        organization_id,
        points,
        PointAction::Refund,
        description,
    )
    .await?;

    debug!(client_id = %client_id, points, "Refunded points");
    Ok(())
}

/// Reads a balance; `None` when the client never touched points in this
/// organization.
pub async fn get_balance(
    conn: &mut SqliteConnection,
    client_id: &str,
    organization_id: &str,
) -> DbResult<Option<PointBalance>> {
    let balance = sqlx::query_as::<_, PointBalance>(
        r#"
        SELECT client_id, organization_id, points_current, points_spent
        FROM affiliate_point_balances
        WHERE client_id = ?1 AND organization_id = ?2
        "#,
    )
    .bind(client_id)
    .bind(organization_id)
    .fetch_optional(conn)
    .await?;

    Ok(balance)
}

/// Appends one immutable ledger entry. Rows here are never updated or
/// deleted.
async fn append_log(
    conn: &mut SqliteConnection,
    client_id: &str,
    organization_id: &str,
    points: i64,
    action: PointAction,
    description: &str,
) -> DbResult<()> {
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO affiliate_point_logs (
            id, organization_id, client_id, points, action, description, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(organization_id)
    .bind(client_id)
    .bind(points)
    .bind(action)
    .bind(description)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(())
}
