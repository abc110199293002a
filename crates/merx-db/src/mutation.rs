//! # Cart Mutation Transaction
//!
//! The orchestrator: one atomic unit-of-work that applies a single unit of
//! "add" or "subtract" to one cart line, recomputes tier pricing across
//! tier-mates, settles the affiliate point ledger, adjusts stock, and stamps
//! the cart's integrity fingerprint.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Mutation Flow                                   │
//! │                                                                         │
//! │  START ──► LOAD_LINE ──► RESOLVE_PRICE ──► (AFFILIATE_GUARD)            │
//! │                                                  │                      │
//! │                ┌─────────────────────────────────┘                      │
//! │                ▼                                                        │
//! │          APPLY_LEDGER (affiliate lines)                                 │
//! │                │                                                        │
//! │                ▼                                                        │
//! │          PERSIST_LINE (delete at zero)                                  │
//! │                │                                                        │
//! │                ▼                                                        │
//! │          APPLY_TIER_PRICING (regular lines, rewrites ALL tier-mates)    │
//! │                │                                                        │
//! │                ▼                                                        │
//! │          ADJUST_STOCK ──► STAMP_HASH ──► COMMIT                         │
//! │                                                                         │
//! │  Any failure at any step ──► ROLLBACK (no partial effects, ever)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Atomicity
//! Everything runs inside ONE SQLite write transaction. SQLite's
//! single-writer model means no two mutations interleave their
//! read-recompute-write of sibling line prices, and the point ledger's
//! conditional UPDATE makes the balance check-and-decrement a single
//! statement. A failed step rolls the whole transaction back; "points
//! reserved but stock not adjusted" is never an observable state.
//!
//! ## One Unit Per Step
//! The engine's primitive moves a line by exactly one unit. The public
//! batch entry point loops the primitive N times INSIDE one transaction,
//! which keeps ledger deltas auditable (`1 × unit price` per step) without
//! N round trips.

use sqlx::SqliteConnection;
use thiserror::Error;
use tracing::{debug, info};

use crate::error::DbError;
use crate::pool::Database;
use crate::repository::catalog::CatalogItem;
use crate::repository::points::ReserveOutcome;
use crate::repository::stock::StockOutcome;
use crate::repository::{cart, catalog, points, stock, tier};
use merx_core::{
    cart_fingerprint, tier::find_tier, tier::price_for_quantity, validation, CartChannel,
    CartSnapshot, CoreError, LineRef, MutationAction, ResolvedPrice, TierRule,
    CART_LEDGER_DESCRIPTION,
};

// =============================================================================
// Error & Request Types
// =============================================================================

/// Everything a cart mutation can fail with: a business-rule/not-found
/// failure from the domain, or an infrastructure failure from the database.
/// Either way the transaction has been rolled back in full.
#[derive(Debug, Error)]
pub enum MutationError {
    #[error(transparent)]
    Domain(#[from] CoreError),

    #[error(transparent)]
    Db(#[from] DbError),
}

/// One cart line mutation request.
#[derive(Debug, Clone)]
pub struct MutationRequest {
    /// The cart to mutate.
    pub cart_id: String,

    /// Calling organization (multi-tenant scope for every query).
    pub organization_id: String,

    /// Which catalog entry the line references.
    pub line: LineRef,

    /// Optional variation within the catalog entry.
    pub variation_id: Option<String>,

    /// Add or subtract one unit per step.
    pub action: MutationAction,
}

// =============================================================================
// Cart Mutator
// =============================================================================

/// Executes cart line mutations as atomic transactions.
///
/// Stateless between calls: each mutation takes one pooled connection for
/// one transaction. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CartMutator {
    db: Database,
}

impl CartMutator {
    /// Creates a mutator over the given database handle.
    pub fn new(db: Database) -> Self {
        CartMutator { db }
    }

    /// Applies exactly one unit of `action` to the (product, variation)
    /// line of the cart and returns the committed snapshot.
    pub async fn mutate(&self, request: &MutationRequest) -> Result<CartSnapshot, MutationError> {
        self.mutate_many(request, 1).await
    }

    /// Applies `count` units of `action` inside ONE transaction by looping
    /// the single-unit primitive.
    ///
    /// `count` is bounded (see [`merx_core::MAX_BATCH_QUANTITY`]); the
    /// bound is validated before the transaction opens.
    pub async fn mutate_many(
        &self,
        request: &MutationRequest,
        count: i64,
    ) -> Result<CartSnapshot, MutationError> {
        validation::validate_batch_quantity(count).map_err(CoreError::from)?;

        debug!(
            cart_id = %request.cart_id,
            catalog_id = %request.line.catalog_id(),
            action = ?request.action,
            count,
            "Starting cart mutation"
        );

        let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;

        let snapshot = self.run(&mut *tx, request, count).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            cart_id = %request.cart_id,
            catalog_id = %request.line.catalog_id(),
            action = ?request.action,
            count,
            lines = snapshot.lines.len(),
            "Cart mutation committed"
        );

        Ok(snapshot)
    }

    /// The transaction body. Errors returned from here drop the transaction
    /// guard, which rolls everything back.
    async fn run(
        &self,
        conn: &mut SqliteConnection,
        request: &MutationRequest,
        count: i64,
    ) -> Result<CartSnapshot, MutationError> {
        let variation_id = request.variation_id.as_deref();

        // LOAD_LINE: cart + owning client, scoped by organization.
        let ctx = cart::get_cart_with_client(conn, &request.cart_id, &request.organization_id)
            .await?
            .ok_or_else(|| CoreError::CartNotFound(request.cart_id.clone()))?;

        // The client's country keys every price and stock lookup below; a
        // malformed row must not surface as a misleading missing-price
        // failure.
        validation::validate_country(&ctx.client.country).map_err(CoreError::from)?;

        // Subtracting from a line that does not exist is a distinct,
        // user-actionable failure - checked before price resolution.
        if request.action == MutationAction::Subtract {
            let existing =
                cart::find_line(conn, &ctx.cart.id, &request.line, variation_id).await?;
            if existing.is_none() {
                return Err(CoreError::LineNotFound {
                    catalog_id: request.line.catalog_id().to_string(),
                }
                .into());
            }
        }

        // RESOLVE_PRICE: base unit price/points for the referenced entry.
        let item = catalog::get_item(conn, &request.line).await?;
        let base_price = catalog::resolve_price(
            conn,
            &request.line,
            variation_id,
            &ctx.client.country,
            ctx.client.level_id.as_deref(),
        )
        .await?;

        let (item, base_price) = match (item, base_price) {
            (Some(item), Some(price)) => (item, price),
            _ => return Err(pricing_failure(&request.line, &ctx.client.country).into()),
        };

        // AFFILIATE_GUARD: level gate and POS cross-tenant gate, before any
        // ledger or stock effect.
        if request.line.is_affiliate() {
            if let Some(required_level) = item.required_level_id.as_deref() {
                if ctx.client.level_id.as_deref() != Some(required_level) {
                    return Err(CoreError::LevelNotEligible {
                        affiliate_product_id: item.id.clone(),
                        required_level: required_level.to_string(),
                    }
                    .into());
                }
            }

            if ctx.cart.channel == CartChannel::Pos
                && item.organization_id != ctx.cart.organization_id
            {
                return Err(CoreError::SharedProductForbiddenInPos {
                    catalog_id: item.id.clone(),
                }
                .into());
            }
        }

        // Tier rules are immutable inputs for the whole transaction.
        let rules = if request.line.is_affiliate() {
            Vec::new()
        } else {
            tier::load_active_rules(conn, &request.organization_id).await?
        };

        for _ in 0..count {
            self.apply_unit(conn, &ctx, request, &item, &base_price, &rules)
                .await?;
        }

        // STAMP_HASH: deterministic digest over the full line set.
        let lines = cart::list_lines(conn, &ctx.cart.id).await?;
        let fingerprint = cart_fingerprint(&lines);
        cart::stamp_fingerprint(conn, &ctx.cart.id, &fingerprint).await?;

        let views = cart::snapshot_lines(conn, &ctx.cart.id).await?;
        Ok(CartSnapshot { lines: views })
    }

    /// Applies one unit of the action: ledger, line persistence, tier
    /// repricing, stock adjustment.
    async fn apply_unit(
        &self,
        conn: &mut SqliteConnection,
        ctx: &cart::CartContext,
        request: &MutationRequest,
        item: &CatalogItem,
        base_price: &ResolvedPrice,
        rules: &[TierRule],
    ) -> Result<(), MutationError> {
        let variation_id = request.variation_id.as_deref();

        let existing = cart::find_line(conn, &ctx.cart.id, &request.line, variation_id).await?;

        let new_quantity = match (&existing, request.action) {
            (Some(line), _) => line.quantity + request.action.quantity_delta(),
            (None, MutationAction::Add) => 1,
            (None, MutationAction::Subtract) => {
                return Err(CoreError::LineNotFound {
                    catalog_id: request.line.catalog_id().to_string(),
                }
                .into());
            }
        };

        if new_quantity < 0 {
            return Err(CoreError::NegativeQuantity {
                catalog_id: request.line.catalog_id().to_string(),
            }
            .into());
        }

        // APPLY_LEDGER (affiliate lines): one unit's worth of points,
        // before any price or stock mutation happens.
        if let ResolvedPrice::AffiliatePoints(unit_points) = base_price {
            let amount = unit_points.amount();
            match request.action {
                MutationAction::Add => {
                    let outcome = points::reserve(
                        conn,
                        &ctx.client.id,
                        &ctx.cart.organization_id,
                        amount,
                        CART_LEDGER_DESCRIPTION,
                    )
                    .await?;

                    if let ReserveOutcome::Insufficient { available } = outcome {
                        return Err(CoreError::InsufficientPoints {
                            required: amount,
                            available,
                        }
                        .into());
                    }
                }
                MutationAction::Subtract => {
                    points::refund(
                        conn,
                        &ctx.client.id,
                        &ctx.cart.organization_id,
                        amount,
                        CART_LEDGER_DESCRIPTION,
                    )
                    .await?;
                }
            }
        }

        // PERSIST_LINE: delete at zero, otherwise upsert quantity with the
        // base price (tier repricing below may overwrite it).
        match &existing {
            Some(line) if new_quantity == 0 => {
                cart::delete_line(conn, &line.id).await?;
            }
            Some(line) => {
                cart::update_line(conn, &line.id, new_quantity, base_price.amount()).await?;
            }
            None => {
                cart::insert_line(
                    conn,
                    &ctx.cart.id,
                    &request.line,
                    variation_id,
                    new_quantity,
                    base_price.amount(),
                )
                .await?;
            }
        }

        // APPLY_TIER_PRICING (regular lines): rewrite every tier-mate, not
        // just the mutated line, from the post-mutation cumulative quantity.
        if !request.line.is_affiliate() {
            self.apply_tier_pricing(conn, ctx, request, rules).await?;
        }

        // ADJUST_STOCK: reserve on add, release on subtract.
        let outcome = stock::adjust(
            conn,
            request.line.catalog_id(),
            variation_id,
            &ctx.client.country,
            request.action.stock_delta(),
            self.db.allow_backorder(),
        )
        .await?;

        if let StockOutcome::Floored { .. } = outcome {
            return Err(CoreError::InsufficientStock {
                catalog_id: request.line.catalog_id().to_string(),
                country: ctx.client.country.clone(),
            }
            .into());
        }

        Ok(())
    }

    /// Recomputes tier pricing for the mutated line's tier, rewriting the
    /// unit price of every line the matched rule covers.
    ///
    /// When the cumulative quantity no longer reaches any step, each
    /// covered line falls back to its OWN base price - tier-mates need not
    /// share one.
    async fn apply_tier_pricing(
        &self,
        conn: &mut SqliteConnection,
        ctx: &cart::CartContext,
        request: &MutationRequest,
        rules: &[TierRule],
    ) -> Result<(), MutationError> {
        let rule = match find_tier(
            rules,
            &ctx.client.country,
            request.line.catalog_id(),
            request.variation_id.as_deref(),
            &ctx.client.id,
        ) {
            Some(rule) => rule,
            None => return Ok(()),
        };

        let lines = cart::list_lines(conn, &ctx.cart.id).await?;
        let covered: Vec<_> = lines
            .iter()
            .filter(|l| rule.covers(l.line.catalog_id(), l.variation_id.as_deref()))
            .collect();

        let cumulative: i64 = covered.iter().map(|l| l.quantity).sum();
        let tier_price = price_for_quantity(&rule.steps, cumulative);

        debug!(
            rule_id = %rule.id,
            cumulative,
            tier_price = ?tier_price,
            mates = covered.len(),
            "Applying tier pricing"
        );

        for line in covered {
            let unit_price = match tier_price {
                Some(price) => price,
                None => {
                    // Below every step: back to the line's own base price.
                    let base = catalog::resolve_price(
                        conn,
                        &line.line,
                        line.variation_id.as_deref(),
                        &ctx.client.country,
                        ctx.client.level_id.as_deref(),
                    )
                    .await?
                    .ok_or_else(|| pricing_failure(&line.line, &ctx.client.country))?;
                    base.amount()
                }
            };

            cart::rewrite_line_price(conn, &line.id, unit_price).await?;
        }

        Ok(())
    }
}

/// Maps a missing price row to the failure kind of the line's universe.
fn pricing_failure(line: &LineRef, country: &str) -> CoreError {
    match line {
        LineRef::Product { product_id } => CoreError::PricingNotFound {
            catalog_id: product_id.clone(),
            country: country.to_string(),
        },
        LineRef::Affiliate {
            affiliate_product_id,
        } => CoreError::NoPointsPriceConfigured {
            affiliate_product_id: affiliate_product_id.clone(),
        },
    }
}
