//! # Catalog Repository & Price Resolver
//!
//! Read-only lookups into the two catalog universes and base price
//! resolution.
//!
//! ## Price Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Base Price Resolution                              │
//! │                                                                         │
//! │  Regular product                    Affiliate product                   │
//! │  ───────────────                    ─────────────────                   │
//! │  product_prices rows for            affiliate_product_points rows for   │
//! │  (product, variation?, country)     (product, variation?)               │
//! │       │                                  │                              │
//! │       ▼                                  ▼                              │
//! │  pick most specific:                sale_points per level,              │
//! │  variation > product-wide           falling back to the level-less      │
//! │  client level > level-less          default row; then regular_points    │
//! │       │                             the same way                        │
//! │       ▼                                  │                              │
//! │  Money (cents)                           ▼                              │
//! │  or PricingNotFound                 Points - zero/absent means          │
//! │                                     NoPointsPriceConfigured             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Pure reads: nothing in this module writes.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use merx_core::{LineRef, Money, Points, ResolvedPrice};

/// A catalog entry from either universe, as the mutation needs it:
/// ownership for the POS tenant guard, level gate for affiliate products,
/// display fields for snapshot views.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CatalogItem {
    pub id: String,
    pub organization_id: String,
    pub title: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub sku: Option<String>,
    /// Minimum affiliate level required to buy; always `None` for regular
    /// products.
    pub required_level_id: Option<String>,
}

/// Loads the catalog entry a line reference points at.
pub async fn get_item(conn: &mut SqliteConnection, line: &LineRef) -> DbResult<Option<CatalogItem>> {
    let item = match line {
        LineRef::Product { product_id } => {
            sqlx::query_as::<_, CatalogItem>(
                r#"
                SELECT
                    id,
                    organization_id,
                    title,
                    description,
                    image,
                    sku,
                    NULL AS required_level_id
                FROM products
                WHERE id = ?1
                "#,
            )
            .bind(product_id)
            .fetch_optional(conn)
            .await?
        }
        LineRef::Affiliate {
            affiliate_product_id,
        } => {
            sqlx::query_as::<_, CatalogItem>(
                r#"
                SELECT
                    id,
                    organization_id,
                    title,
                    description,
                    image,
                    sku,
                    required_level_id
                FROM affiliate_products
                WHERE id = ?1
                "#,
            )
            .bind(affiliate_product_id)
            .fetch_optional(conn)
            .await?
        }
    };

    Ok(item)
}

/// Resolves the base unit price for a line reference.
///
/// Returns `None` when no price row qualifies - the mutation maps that to
/// `PricingNotFound` or `NoPointsPriceConfigured` depending on line kind.
pub async fn resolve_price(
    conn: &mut SqliteConnection,
    line: &LineRef,
    variation_id: Option<&str>,
    country: &str,
    level_id: Option<&str>,
) -> DbResult<Option<ResolvedPrice>> {
    match line {
        LineRef::Product { product_id } => {
            resolve_currency_price(conn, product_id, variation_id, country, level_id).await
        }
        LineRef::Affiliate {
            affiliate_product_id,
        } => resolve_points_price(conn, affiliate_product_id, variation_id, level_id).await,
    }
}

/// Currency lookup: the most specific qualifying row wins
/// (variation-specific before product-wide, client level before level-less).
async fn resolve_currency_price(
    conn: &mut SqliteConnection,
    product_id: &str,
    variation_id: Option<&str>,
    country: &str,
    level_id: Option<&str>,
) -> DbResult<Option<ResolvedPrice>> {
    let price: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT price_cents
        FROM product_prices
        WHERE product_id = ?1
          AND (variation_id = ?2 OR variation_id IS NULL)
          AND country = ?3 COLLATE NOCASE
          AND (level_id = ?4 OR level_id IS NULL)
        ORDER BY (variation_id IS NULL) ASC, (level_id IS NULL) ASC
        LIMIT 1
        "#,
    )
    .bind(product_id)
    .bind(variation_id)
    .bind(country)
    .bind(level_id)
    .fetch_optional(conn)
    .await?;

    debug!(product_id = %product_id, country = %country, price = ?price, "Resolved currency price");

    Ok(price.map(|cents| ResolvedPrice::Currency(Money::from_cents(cents))))
}

/// One affiliate points row; `level_id IS NULL` rows are the default tier.
#[derive(Debug, sqlx::FromRow)]
struct PointsRow {
    sale_points: Option<i64>,
    regular_points: Option<i64>,
}

/// Points lookup: sale points first (per level, falling back to the default
/// tier), then regular points the same way. A value of zero counts as
/// absent.
async fn resolve_points_price(
    conn: &mut SqliteConnection,
    affiliate_product_id: &str,
    variation_id: Option<&str>,
    level_id: Option<&str>,
) -> DbResult<Option<ResolvedPrice>> {
    let rows = sqlx::query_as::<_, PointsRow>(
        r#"
        SELECT sale_points, regular_points
        FROM affiliate_product_points
        WHERE affiliate_product_id = ?1
          AND (variation_id = ?2 OR variation_id IS NULL)
          AND (level_id = ?3 OR level_id IS NULL)
        ORDER BY (variation_id IS NULL) ASC, (level_id IS NULL) ASC
        "#,
    )
    .bind(affiliate_product_id)
    .bind(variation_id)
    .bind(level_id)
    .fetch_all(conn)
    .await?;

    // Rows arrive most-specific first; take the first usable value per
    // column, sale points winning over regular points.
    let sale = rows.iter().find_map(|r| r.sale_points.filter(|p| *p > 0));
    let regular = rows
        .iter()
        .find_map(|r| r.regular_points.filter(|p| *p > 0));
    let points = sale.or(regular);

    debug!(
        affiliate_product_id = %affiliate_product_id,
        points = ?points,
        "Resolved points price"
    );

    Ok(points.map(|p| ResolvedPrice::AffiliatePoints(Points::new(p))))
}
