//! # Stock Ledger
//!
//! Signed-delta adjustments to on-hand stock, the sole inventory writer on
//! the cart mutation path.
//!
//! ## Keying
//! Stock is tracked per (product or variation, country): a line with a
//! variation adjusts the variation's record, otherwise the product's. The
//! catalog id may come from either universe.
//!
//! ## Backorder Policy
//! The ledger itself does not insist on non-negative stock; overselling at
//! the cart-reservation layer is allowed by default. With
//! `allow_backorder = false` the reserving UPDATE carries a floor guard and
//! reports [`StockOutcome::Floored`] instead of going negative.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;

/// Result of a stock adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockOutcome {
    /// The delta was applied.
    Applied,
    /// The floor guard rejected the delta (backorder disabled).
    Floored { available: i64 },
}

/// Applies a signed delta to the stock record for the given key, creating
/// the record lazily on first touch.
///
/// "Add to cart" passes `-1` (reserve); "subtract from cart" passes `+1`
/// (release).
pub async fn adjust(
    conn: &mut SqliteConnection,
    catalog_id: &str,
    variation_id: Option<&str>,
    country: &str,
    delta: i64,
    allow_backorder: bool,
) -> DbResult<StockOutcome> {
    // Variation-level stock when a variation is in play, product-level
    // stock otherwise.
    let (product_key, variation_key) = match variation_id {
        Some(v) => (None, Some(v)),
        None => (Some(catalog_id), None),
    };

    let now = Utc::now();
    let guarded = !allow_backorder && delta < 0;

    let update = if guarded {
        r#"
        UPDATE stock_records SET
            quantity = quantity + ?4,
            updated_at = ?5
        WHERE (product_id = ?1 OR (?1 IS NULL AND product_id IS NULL))
          AND (variation_id = ?2 OR (?2 IS NULL AND variation_id IS NULL))
          AND country = ?3
          AND quantity + ?4 >= 0
        "#
    } else {
        r#"
        UPDATE stock_records SET
            quantity = quantity + ?4,
            updated_at = ?5
        WHERE (product_id = ?1 OR (?1 IS NULL AND product_id IS NULL))
          AND (variation_id = ?2 OR (?2 IS NULL AND variation_id IS NULL))
          AND country = ?3
        "#
    };

    let result = sqlx::query(update)
        .bind(product_key)
        .bind(variation_key)
        .bind(country)
        .bind(delta)
        .bind(now)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() > 0 {
        debug!(catalog_id = %catalog_id, country = %country, delta, "Adjusted stock");
        return Ok(StockOutcome::Applied);
    }

    // No row was touched: either the record does not exist yet, or the
    // floor guard blocked the update.
    let existing = on_hand(&mut *conn, catalog_id, variation_id, country).await?;

    if let Some(available) = existing {
        // Row exists but the guard refused the delta.
        return Ok(StockOutcome::Floored { available });
    }

    if guarded {
        // First touch with a reserving delta and no stock on record.
        return Ok(StockOutcome::Floored { available: 0 });
    }

    // Lazy creation on first adjustment.
    sqlx::query(
        r#"
        INSERT INTO stock_records (id, product_id, variation_id, country, quantity, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(product_key)
    .bind(variation_key)
    .bind(country)
    .bind(delta)
    .bind(now)
    .execute(conn)
    .await?;

    debug!(catalog_id = %catalog_id, country = %country, delta, "Created stock record");

    Ok(StockOutcome::Applied)
}

/// Reads the on-hand quantity for a key, `None` when untracked.
pub async fn on_hand(
    conn: &mut SqliteConnection,
    catalog_id: &str,
    variation_id: Option<&str>,
    country: &str,
) -> DbResult<Option<i64>> {
    let (product_key, variation_key) = match variation_id {
        Some(v) => (None, Some(v)),
        None => (Some(catalog_id), None),
    };

    let quantity = sqlx::query_scalar(
        r#"
        SELECT quantity
        FROM stock_records
        WHERE (product_id = ?1 OR (?1 IS NULL AND product_id IS NULL))
          AND (variation_id = ?2 OR (?2 IS NULL AND variation_id IS NULL))
          AND country = ?3
        "#,
    )
    .bind(product_key)
    .bind(variation_key)
    .bind(country)
    .fetch_optional(conn)
    .await?;

    Ok(quantity)
}
