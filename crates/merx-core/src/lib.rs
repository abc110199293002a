//! # merx-core: Pure Business Logic for the Merx Cart Engine
//!
//! This crate is the **heart** of the cart line mutation engine. It contains
//! all business logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Merx Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                  cart-api (HTTP endpoint)                       │    │
//! │  │        PATCH /carts/{id}/lines  →  CartSnapshot                 │    │
//! │  └─────────────────────────────┬───────────────────────────────────┘    │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐    │
//! │  │               ★ merx-core (THIS CRATE) ★                        │    │
//! │  │                                                                 │    │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌────────────┐   │    │
//! │  │   │   types   │  │   money   │  │   tier    │  │fingerprint │   │    │
//! │  │   │ CartLine  │  │   Money   │  │ find_tier │  │  SHA-256   │   │    │
//! │  │   │ TierRule  │  │  Points   │  │ step walk │  │   digest   │   │    │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └────────────┘   │    │
//! │  │                                                                 │    │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │    │
//! │  └─────────────────────────────┬───────────────────────────────────┘    │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐    │
//! │  │                    merx-db (Database Layer)                     │    │
//! │  │      SQLite repositories + the atomic mutation transaction      │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Cart, CartLine, TierRule, views)
//! - [`money`] - Money and Points types with integer arithmetic
//! - [`tier`] - Tier rule selection and quantity step walk
//! - [`fingerprint`] - Cart integrity digest
//! - [`error`] - Domain error types
//! - [`validation`] - Pre-transaction request validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Amounts**: Cents and points are i64, never floats
//! 4. **Explicit Errors**: All errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod fingerprint;
pub mod money;
pub mod tier;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use merx_core::Money` instead of
// `use merx_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use fingerprint::cart_fingerprint;
pub use money::{Money, Points};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum units a single batch mutation request may apply.
///
/// ## Business Reason
/// The engine's primitive is one unit per step; the public endpoint loops it
/// inside one transaction. Bounding the loop keeps a single transaction's
/// blast radius small and catches fat-finger quantities (1000 vs 10).
pub const MAX_BATCH_QUANTITY: i64 = 100;

/// Description stamped on ledger entries written by cart mutations.
///
/// The ledger is append-only and audited; a stable, recognizable
/// description distinguishes cart reservations from checkout redemptions.
pub const CART_LEDGER_DESCRIPTION: &str = "cart reservation";
