//! # Error Types
//!
//! Domain-specific error types for merx-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  merx-core errors (this file)                                           │
//! │  ├── CoreError        - Business-rule and not-found failures            │
//! │  └── ValidationError  - Input validation failures                       │
//! │                                                                         │
//! │  merx-db errors (separate crate)                                        │
//! │  ├── DbError          - Database operation failures                     │
//! │  └── MutationError    - CoreError | DbError union for the transaction   │
//! │                                                                         │
//! │  cart-api errors (in app)                                               │
//! │  └── ApiError         - What the HTTP caller sees (serialized)          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → MutationError → ApiError → caller  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (ids, balances, levels)
//! 3. Errors are enum variants, never String
//! 4. Every business failure aborts the whole transaction; nothing is
//!    silently recovered

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business-rule and not-found failures of the cart mutation engine.
///
/// Each variant maps one-to-one to a user-actionable condition: the caller
/// can decide to retry (top up points, pick another product) or surface a
/// terminal message. All of them roll the mutation back with no partial
/// effects.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The cart id did not resolve to a cart.
    #[error("Cart not found: {0}")]
    CartNotFound(String),

    /// Subtract was requested for a (product, variation) key with no
    /// existing line in the cart.
    #[error("Cart line not found for {catalog_id}")]
    LineNotFound { catalog_id: String },

    /// The affiliate product requires a level the client does not hold.
    #[error("Affiliate product {affiliate_product_id} requires level {required_level}")]
    LevelNotEligible {
        affiliate_product_id: String,
        required_level: String,
    },

    /// The client's spendable point balance cannot cover the reservation.
    ///
    /// ## When This Occurs
    /// ```text
    /// Add affiliate item (cost: 10 pts)
    ///      │
    ///      ▼
    /// Balance check: points_current = 5
    ///      │
    ///      ▼
    /// InsufficientPoints { required: 10, available: 5 }
    ///      │
    ///      ▼
    /// Whole transaction rolls back; balance stays 5
    /// ```
    #[error("Insufficient points: required {required}, available {available}")]
    InsufficientPoints { required: i64, available: i64 },

    /// The mutation would drive the line quantity below zero.
    #[error("Quantity for {catalog_id} cannot go below zero")]
    NegativeQuantity { catalog_id: String },

    /// No currency price is configured for the product in the cart's country.
    #[error("No price configured for {catalog_id} in {country}")]
    PricingNotFound { catalog_id: String, country: String },

    /// No point cost is configured for the affiliate product.
    #[error("No points price configured for affiliate product {affiliate_product_id}")]
    NoPointsPriceConfigured { affiliate_product_id: String },

    /// POS carts must not sell products owned by another organization.
    #[error("Product {catalog_id} belongs to another organization and cannot be sold at a register")]
    SharedProductForbiddenInPos { catalog_id: String },

    /// Stock would go negative and backorder is disabled.
    #[error("Insufficient stock for {catalog_id} in {country}")]
    InsufficientStock { catalog_id: String, country: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These are rejected before any transaction opens - a malformed request
/// never touches the database.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., unknown action, malformed id).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Exactly one of two mutually exclusive fields must be present.
    #[error("exactly one of {first} or {second} must be set")]
    MutuallyExclusive { first: String, second: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
