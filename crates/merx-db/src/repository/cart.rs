//! # Cart Repository
//!
//! Database operations for carts and cart lines.
//!
//! ## Line Identity
//! A line is found by its exact (product-or-affiliate id, variation) key
//! within a cart; the unique index `idx_cart_lines_key` backs that up. A
//! line reaching quantity zero is deleted, never kept - `list_lines` after
//! any committed mutation therefore only ever returns positive quantities.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use merx_core::{Cart, CartChannel, CartLine, CartLineView, Client, LineRef};

// =============================================================================
// Cart + Client Context
// =============================================================================

/// The cart joined through to its owning client - everything the mutation
/// needs to know about whose cart it is working on.
#[derive(Debug, Clone)]
pub struct CartContext {
    pub cart: Cart,
    pub client: Client,
}

#[derive(Debug, sqlx::FromRow)]
struct CartClientRow {
    id: String,
    client_id: String,
    organization_id: String,
    channel: CartChannel,
    cart_updated_hash: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    client_organization_id: String,
    country: String,
    level_id: Option<String>,
}

/// Loads a cart with its owning client, scoped to the calling organization.
pub async fn get_cart_with_client(
    conn: &mut SqliteConnection,
    cart_id: &str,
    organization_id: &str,
) -> DbResult<Option<CartContext>> {
    let row = sqlx::query_as::<_, CartClientRow>(
        r#"
        SELECT
            c.id,
            c.client_id,
            c.organization_id,
            c.channel,
            c.cart_updated_hash,
            c.created_at,
            c.updated_at,
            cl.organization_id AS client_organization_id,
            cl.country,
            cl.level_id
        FROM carts c
        INNER JOIN clients cl ON cl.id = c.client_id
        WHERE c.id = ?1 AND c.organization_id = ?2
        "#,
    )
    .bind(cart_id)
    .bind(organization_id)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(|r| CartContext {
        cart: Cart {
            id: r.id,
            client_id: r.client_id.clone(),
            organization_id: r.organization_id,
            channel: r.channel,
            cart_updated_hash: r.cart_updated_hash,
            created_at: r.created_at,
            updated_at: r.updated_at,
        },
        client: Client {
            id: r.client_id,
            organization_id: r.client_organization_id,
            country: r.country,
            level_id: r.level_id,
        },
    }))
}

// =============================================================================
// Cart Lines
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    id: String,
    cart_id: String,
    product_id: Option<String>,
    affiliate_product_id: Option<String>,
    variation_id: Option<String>,
    quantity: i64,
    unit_price: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CartLineRow {
    /// The schema CHECK guarantees exactly one catalog reference is set;
    /// anything else is data corruption, surfaced as an internal error.
    fn into_line(self) -> DbResult<CartLine> {
        let line = match (self.product_id, self.affiliate_product_id) {
            (Some(product_id), None) => LineRef::Product { product_id },
            (None, Some(affiliate_product_id)) => LineRef::Affiliate {
                affiliate_product_id,
            },
            _ => {
                return Err(DbError::Internal(format!(
                    "cart line {} has inconsistent catalog references",
                    self.id
                )))
            }
        };

        Ok(CartLine {
            id: self.id,
            cart_id: self.cart_id,
            line,
            variation_id: self.variation_id,
            quantity: self.quantity,
            unit_price: self.unit_price,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const LINE_COLUMNS: &str = r#"
    id, cart_id, product_id, affiliate_product_id, variation_id,
    quantity, unit_price, created_at, updated_at
"#;

/// Finds the line for the exact (product-or-affiliate, variation) key.
pub async fn find_line(
    conn: &mut SqliteConnection,
    cart_id: &str,
    line: &LineRef,
    variation_id: Option<&str>,
) -> DbResult<Option<CartLine>> {
    let (product_id, affiliate_product_id) = match line {
        LineRef::Product { product_id } => (Some(product_id.as_str()), None),
        LineRef::Affiliate {
            affiliate_product_id,
        } => (None, Some(affiliate_product_id.as_str())),
    };

    let row = sqlx::query_as::<_, CartLineRow>(&format!(
        r#"
        SELECT {LINE_COLUMNS}
        FROM cart_lines
        WHERE cart_id = ?1
          AND ((?2 IS NOT NULL AND product_id = ?2)
            OR (?3 IS NOT NULL AND affiliate_product_id = ?3))
          AND (variation_id = ?4 OR (?4 IS NULL AND variation_id IS NULL))
        "#
    ))
    .bind(cart_id)
    .bind(product_id)
    .bind(affiliate_product_id)
    .bind(variation_id)
    .fetch_optional(conn)
    .await?;

    row.map(CartLineRow::into_line).transpose()
}

/// Lists all lines of a cart in insertion order.
pub async fn list_lines(conn: &mut SqliteConnection, cart_id: &str) -> DbResult<Vec<CartLine>> {
    let rows = sqlx::query_as::<_, CartLineRow>(&format!(
        r#"
        SELECT {LINE_COLUMNS}
        FROM cart_lines
        WHERE cart_id = ?1
        ORDER BY created_at, id
        "#
    ))
    .bind(cart_id)
    .fetch_all(conn)
    .await?;

    rows.into_iter().map(CartLineRow::into_line).collect()
}

/// Inserts a fresh cart line (first "add" of a product) and returns it.
pub async fn insert_line(
    conn: &mut SqliteConnection,
    cart_id: &str,
    line: &LineRef,
    variation_id: Option<&str>,
    quantity: i64,
    unit_price: i64,
) -> DbResult<CartLine> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    let (product_id, affiliate_product_id) = match line {
        LineRef::Product { product_id } => (Some(product_id.as_str()), None),
        LineRef::Affiliate {
            affiliate_product_id,
        } => (None, Some(affiliate_product_id.as_str())),
    };

    debug!(cart_id = %cart_id, catalog_id = %line.catalog_id(), quantity, "Inserting cart line");

    sqlx::query(
        r#"
        INSERT INTO cart_lines (
            id, cart_id, product_id, affiliate_product_id, variation_id,
            quantity, unit_price, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&id)
    .bind(cart_id)
    .bind(product_id)
    .bind(affiliate_product_id)
    .bind(variation_id)
    .bind(quantity)
    .bind(unit_price)
    .bind(now)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(CartLine {
        id,
        cart_id: cart_id.to_string(),
        line: line.clone(),
        variation_id: variation_id.map(String::from),
        quantity,
        unit_price,
        created_at: now,
        updated_at: now,
    })
}

/// Updates quantity and unit price of an existing line.
pub async fn update_line(
    conn: &mut SqliteConnection,
    line_id: &str,
    quantity: i64,
    unit_price: i64,
) -> DbResult<()> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE cart_lines SET
            quantity = ?2,
            unit_price = ?3,
            updated_at = ?4
        WHERE id = ?1
        "#,
    )
    .bind(line_id)
    .bind(quantity)
    .bind(unit_price)
    .bind(now)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Cart line", line_id));
    }

    Ok(())
}

/// Rewrites only the unit price of a line (tier sibling repricing).
pub async fn rewrite_line_price(
    conn: &mut SqliteConnection,
    line_id: &str,
    unit_price: i64,
) -> DbResult<()> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE cart_lines SET
            unit_price = ?2,
            updated_at = ?3
        WHERE id = ?1 AND unit_price <> ?2
        "#,
    )
    .bind(line_id)
    .bind(unit_price)
    .bind(now)
    .execute(conn)
    .await?;

    if result.rows_affected() > 0 {
        debug!(line_id = %line_id, unit_price, "Rewrote sibling line price");
    }

    Ok(())
}

/// Deletes a line (quantity reached zero).
pub async fn delete_line(conn: &mut SqliteConnection, line_id: &str) -> DbResult<()> {
    debug!(line_id = %line_id, "Deleting cart line");

    let result = sqlx::query("DELETE FROM cart_lines WHERE id = ?1")
        .bind(line_id)
        .execute(conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Cart line", line_id));
    }

    Ok(())
}

// =============================================================================
// Fingerprint & Snapshot
// =============================================================================

/// Stamps the integrity fingerprint and bumps the cart's updated_at.
pub async fn stamp_fingerprint(
    conn: &mut SqliteConnection,
    cart_id: &str,
    fingerprint: &str,
) -> DbResult<()> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE carts SET
            cart_updated_hash = ?2,
            updated_at = ?3
        WHERE id = ?1
        "#,
    )
    .bind(cart_id)
    .bind(fingerprint)
    .bind(now)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Cart", cart_id));
    }

    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
struct SnapshotRow {
    id: String,
    title: String,
    description: Option<String>,
    image: Option<String>,
    sku: Option<String>,
    quantity: i64,
    unit_price: i64,
    variation_id: Option<String>,
    is_affiliate: bool,
}

/// Assembles the caller-facing view of all cart lines, joined through to
/// whichever catalog universe each line lives in.
pub async fn snapshot_lines(
    conn: &mut SqliteConnection,
    cart_id: &str,
) -> DbResult<Vec<CartLineView>> {
    let rows = sqlx::query_as::<_, SnapshotRow>(
        r#"
        SELECT
            l.id,
            COALESCE(p.title, a.title, '') AS title,
            COALESCE(p.description, a.description) AS description,
            COALESCE(p.image, a.image) AS image,
            COALESCE(p.sku, a.sku) AS sku,
            l.quantity,
            l.unit_price,
            l.variation_id,
            l.affiliate_product_id IS NOT NULL AS is_affiliate
        FROM cart_lines l
        LEFT JOIN products p ON p.id = l.product_id
        LEFT JOIN affiliate_products a ON a.id = l.affiliate_product_id
        WHERE l.cart_id = ?1
        ORDER BY l.created_at, l.id
        "#,
    )
    .bind(cart_id)
    .fetch_all(conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| CartLineView {
            subtotal: r.unit_price * r.quantity,
            id: r.id,
            title: r.title,
            description: r.description,
            image: r.image,
            sku: r.sku,
            quantity: r.quantity,
            unit_price: r.unit_price,
            variation_id: r.variation_id,
            is_affiliate: r.is_affiliate,
        })
        .collect())
}
