//! # Domain Types
//!
//! Core domain types for the cart mutation engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐        │
//! │  │     Cart        │   │    CartLine     │   │     Client      │        │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │        │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │        │
//! │  │  client_id      │   │  line (LineRef) │   │  country        │        │
//! │  │  channel        │   │  quantity       │   │  level_id       │        │
//! │  │  updated_hash   │   │  unit_price     │   │  organization   │        │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘        │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐        │
//! │  │    TierRule     │   │ MutationAction  │   │  ResolvedPrice  │        │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │        │
//! │  │  priority       │   │  Add            │   │  Currency(...)  │        │
//! │  │  countries      │   │  Subtract       │   │  Points(...)    │        │
//! │  │  members, steps │   └─────────────────┘   └─────────────────┘        │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## One Line, One Universe
//! A cart line references either a catalog product (priced in currency) or
//! an affiliate product (priced in points) - never both. [`LineRef`] encodes
//! that as a tagged variant instead of two nullable foreign keys, so the
//! illegal "both set" state is unrepresentable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Money, Points};

// =============================================================================
// Mutation Action
// =============================================================================

/// The two cart line mutations. Each call moves the line quantity by
/// exactly one unit; batch changes loop this primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MutationAction {
    /// Add one unit to the line (creating it if absent).
    Add,
    /// Remove one unit from the line (deleting it at zero).
    Subtract,
}

impl MutationAction {
    /// Signed quantity change this action applies to the cart line.
    #[inline]
    pub const fn quantity_delta(&self) -> i64 {
        match self {
            MutationAction::Add => 1,
            MutationAction::Subtract => -1,
        }
    }

    /// Signed stock change: adding to a cart reserves stock (-1),
    /// subtracting releases it (+1).
    #[inline]
    pub const fn stock_delta(&self) -> i64 {
        -self.quantity_delta()
    }
}

// =============================================================================
// Cart Channel
// =============================================================================

/// Sales channel a cart belongs to.
///
/// POS carts carry an extra tenant guard: a product owned by another
/// organization must never be sold at a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CartChannel {
    /// Online storefront cart.
    Web,
    /// Point-of-sale register cart.
    Pos,
}

// =============================================================================
// Point Ledger Action
// =============================================================================

/// Kind of an affiliate point ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PointAction {
    /// Points reserved by a cart mutation (negative delta).
    Spend,
    /// Points consumed by a completed order (negative delta).
    Redeem,
    /// Points credited back (positive delta).
    Refund,
}

// =============================================================================
// Line Reference
// =============================================================================

/// What a cart line points at: a catalog product priced in currency, or an
/// affiliate product priced in points. Mutually exclusive by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LineRef {
    /// Regular catalog product, currency pricing.
    #[serde(rename_all = "camelCase")]
    Product { product_id: String },
    /// Affiliate product, points pricing.
    #[serde(rename_all = "camelCase")]
    Affiliate { affiliate_product_id: String },
}

impl LineRef {
    /// The referenced catalog id, whichever universe it lives in.
    pub fn catalog_id(&self) -> &str {
        match self {
            LineRef::Product { product_id } => product_id,
            LineRef::Affiliate {
                affiliate_product_id,
            } => affiliate_product_id,
        }
    }

    /// True for points-priced affiliate lines.
    #[inline]
    pub const fn is_affiliate(&self) -> bool {
        matches!(self, LineRef::Affiliate { .. })
    }
}

// =============================================================================
// Cart & Cart Line
// =============================================================================

/// A client's shopping cart.
///
/// The cart row itself is almost inert - the interesting state lives in its
/// lines. `cart_updated_hash` is the integrity fingerprint recomputed after
/// every committed mutation so downstream consumers (checkout) can cheaply
/// detect content changes.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Owning client.
    pub client_id: String,

    /// Organization (tenant) the cart belongs to.
    pub organization_id: String,

    /// Sales channel.
    pub channel: CartChannel,

    /// Integrity fingerprint over the cart's line contents.
    /// `None` until the first mutation stamps it.
    pub cart_updated_hash: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// One distinct (product/variation) row within a cart.
///
/// ## Invariants
/// - `quantity >= 1` while persisted: a line that reaches zero is deleted,
///   never retained.
/// - `unit_price` is cents for product lines and points for affiliate lines.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Owning cart.
    pub cart_id: String,

    /// The referenced catalog entry (product xor affiliate product).
    pub line: LineRef,

    /// Optional variation within the referenced catalog entry.
    pub variation_id: Option<String>,

    /// Units of this product/variation in the cart.
    pub quantity: i64,

    /// Unit price in minor units (cents) or points, per line kind.
    pub unit_price: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl CartLine {
    /// Line subtotal (`unit_price × quantity`) in the line's own universe.
    #[inline]
    pub fn subtotal(&self) -> i64 {
        self.unit_price * self.quantity
    }

    /// True when this line and `other` reference the same catalog entry and
    /// variation (the identity key used by the mutation to find a line).
    pub fn same_key(&self, line: &LineRef, variation_id: Option<&str>) -> bool {
        self.line == *line && self.variation_id.as_deref() == variation_id
    }
}

// =============================================================================
// Client
// =============================================================================

/// The cart owner, read-only input to pricing.
///
/// `country` scopes prices and stock; `level_id` selects the affiliate
/// pricing tier and gates level-restricted affiliate products.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Organization (tenant) the client belongs to.
    pub organization_id: String,

    /// ISO country code used for pricing and stock locale.
    pub country: String,

    /// Affiliate level, if the client is enrolled in the program.
    pub level_id: Option<String>,
}

// =============================================================================
// Resolved Price
// =============================================================================

/// Output of base price resolution: the unit amount in whichever universe
/// the referenced catalog entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedPrice {
    /// Regular product price in cents.
    Currency(Money),
    /// Affiliate product cost in points.
    AffiliatePoints(Points),
}

impl ResolvedPrice {
    /// The raw amount (cents or points).
    #[inline]
    pub const fn amount(&self) -> i64 {
        match self {
            ResolvedPrice::Currency(m) => m.cents(),
            ResolvedPrice::AffiliatePoints(p) => p.amount(),
        }
    }

    /// True for points-priced amounts.
    #[inline]
    pub const fn is_affiliate(&self) -> bool {
        matches!(self, ResolvedPrice::AffiliatePoints(_))
    }
}

// =============================================================================
// Tier Pricing Rules
// =============================================================================

/// One quantity breakpoint inside a tier rule: at or above `min_quantity`
/// cumulative units, the unit price becomes `unit_price`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TierStep {
    /// Minimum cumulative quantity for this step to apply.
    pub min_quantity: i64,

    /// Unit price (cents) at this step.
    pub unit_price: i64,
}

/// A volume-discount rule, read-only input during a mutation.
///
/// ## Selection
/// A rule is a candidate for a line when it is active, its country set
/// contains the cart's country (case-insensitive), and its member lists
/// contain the line's product or variation id. Client-targeted rules beat
/// global ones; within a class the highest `priority` wins, with the
/// lexicographically smallest id as the final deterministic tie-break.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TierRule {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Owning organization.
    pub organization_id: String,

    /// Display name for rule administration.
    pub name: String,

    /// Inactive rules are never candidates.
    pub active: bool,

    /// Explicit tie-break rank; higher wins within a targeting class.
    pub priority: i64,

    /// Countries the rule applies in (compared case-insensitively).
    pub countries: Vec<String>,

    /// Product ids the rule covers.
    pub member_product_ids: Vec<String>,

    /// Variation ids the rule covers.
    pub member_variation_ids: Vec<String>,

    /// Clients the rule targets; empty means the rule is global.
    pub client_ids: Vec<String>,

    /// Quantity breakpoints, ascending by `min_quantity`.
    pub steps: Vec<TierStep>,
}

impl TierRule {
    /// True when the rule explicitly targets `client_id`.
    pub fn targets_client(&self, client_id: &str) -> bool {
        self.client_ids.iter().any(|c| c == client_id)
    }

    /// True when the rule has no client targeting at all.
    #[inline]
    pub fn is_global(&self) -> bool {
        self.client_ids.is_empty()
    }

    /// True when the rule's member lists contain the product or variation.
    pub fn covers(&self, product_or_affiliate_id: &str, variation_id: Option<&str>) -> bool {
        if self
            .member_product_ids
            .iter()
            .any(|p| p == product_or_affiliate_id)
        {
            return true;
        }
        match variation_id {
            Some(v) => self.member_variation_ids.iter().any(|m| m == v),
            None => false,
        }
    }
}

// =============================================================================
// Snapshot Views
// =============================================================================

/// One cart line as returned to the caller after a mutation.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartLineView {
    /// Cart line id.
    pub id: String,

    /// Catalog title at read time.
    pub title: String,

    /// Catalog description at read time.
    pub description: Option<String>,

    /// Catalog image URL at read time.
    pub image: Option<String>,

    /// Catalog SKU at read time.
    pub sku: Option<String>,

    /// Units in the cart.
    pub quantity: i64,

    /// Unit price (cents or points per `is_affiliate`).
    pub unit_price: i64,

    /// Variation within the catalog entry, if any.
    pub variation_id: Option<String>,

    /// True for points-priced affiliate lines.
    pub is_affiliate: bool,

    /// `unit_price × quantity`.
    pub subtotal: i64,
}

/// The full cart contents returned by a committed mutation.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    pub lines: Vec<CartLineView>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_deltas() {
        assert_eq!(MutationAction::Add.quantity_delta(), 1);
        assert_eq!(MutationAction::Subtract.quantity_delta(), -1);
        assert_eq!(MutationAction::Add.stock_delta(), -1);
        assert_eq!(MutationAction::Subtract.stock_delta(), 1);
    }

    #[test]
    fn test_line_ref_accessors() {
        let product = LineRef::Product {
            product_id: "p-1".to_string(),
        };
        let affiliate = LineRef::Affiliate {
            affiliate_product_id: "a-1".to_string(),
        };

        assert_eq!(product.catalog_id(), "p-1");
        assert!(!product.is_affiliate());
        assert_eq!(affiliate.catalog_id(), "a-1");
        assert!(affiliate.is_affiliate());
    }

    #[test]
    fn test_line_key_matching() {
        let line = CartLine {
            id: "l-1".to_string(),
            cart_id: "c-1".to_string(),
            line: LineRef::Product {
                product_id: "p-1".to_string(),
            },
            variation_id: Some("v-1".to_string()),
            quantity: 2,
            unit_price: 1000,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let same = LineRef::Product {
            product_id: "p-1".to_string(),
        };
        assert!(line.same_key(&same, Some("v-1")));
        assert!(!line.same_key(&same, None));
        assert!(!line.same_key(
            &LineRef::Affiliate {
                affiliate_product_id: "p-1".to_string()
            },
            Some("v-1")
        ));
        assert_eq!(line.subtotal(), 2000);
    }

    #[test]
    fn test_tier_rule_coverage() {
        let rule = TierRule {
            id: "t-1".to_string(),
            organization_id: "org-1".to_string(),
            name: "bulk".to_string(),
            active: true,
            priority: 0,
            countries: vec!["US".to_string()],
            member_product_ids: vec!["p-1".to_string()],
            member_variation_ids: vec!["v-9".to_string()],
            client_ids: vec![],
            steps: vec![],
        };

        assert!(rule.covers("p-1", None));
        assert!(rule.covers("p-2", Some("v-9")));
        assert!(!rule.covers("p-2", Some("v-1")));
        assert!(rule.is_global());
        assert!(!rule.targets_client("cl-1"));
    }

    #[test]
    fn test_resolved_price() {
        let currency = ResolvedPrice::Currency(Money::from_cents(1299));
        let points = ResolvedPrice::AffiliatePoints(Points::new(40));

        assert_eq!(currency.amount(), 1299);
        assert!(!currency.is_affiliate());
        assert_eq!(points.amount(), 40);
        assert!(points.is_affiliate());
    }

    #[test]
    fn test_line_ref_serde_tagging() {
        let line = LineRef::Affiliate {
            affiliate_product_id: "a-1".to_string(),
        };
        let json = serde_json::to_string(&line).unwrap();
        assert!(json.contains("\"kind\":\"affiliate\""));
        assert!(json.contains("\"affiliateProductId\":\"a-1\""));
    }
}
