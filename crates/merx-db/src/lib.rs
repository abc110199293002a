//! # merx-db: Database Layer for the Merx Cart Engine
//!
//! This crate provides persistence for the cart mutation engine. It uses
//! SQLite with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Merx Data Flow                                  │
//! │                                                                         │
//! │  PATCH /carts/{id}/lines (cart-api)                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                      merx-db (THIS CRATE)                       │    │
//! │  │                                                                 │    │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐    │    │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │    │    │
//! │  │   │   (pool.rs)   │    │  cart, stock, │    │  (embedded)  │    │    │
//! │  │   │               │◄───│  points, tier │    │ 001_init.sql │    │    │
//! │  │   │  SqlitePool   │    │  catalog      │    │              │    │    │
//! │  │   └───────┬───────┘    └───────▲───────┘    └──────────────┘    │    │
//! │  │           │                    │                                │    │
//! │  │           │     ┌──────────────┴──────────────┐                 │    │
//! │  │           └────►│  CartMutator (mutation.rs)  │                 │    │
//! │  │                 │  ONE transaction per call   │                 │    │
//! │  │                 └─────────────────────────────┘                 │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database (WAL mode)                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - SQL operations per aggregate
//! - [`mutation`] - The atomic cart line mutation transaction
//!
//! ## Usage
//!
//! ```rust,ignore
//! use merx_db::{CartMutator, Database, DbConfig};
//! use merx_core::{LineRef, MutationAction};
//!
//! let db = Database::new(DbConfig::new("merx.db")).await?;
//! let mutator = CartMutator::new(db);
//!
//! let snapshot = mutator
//!     .mutate(&MutationRequest {
//!         cart_id: "...".into(),
//!         organization_id: "...".into(),
//!         line: LineRef::Product { product_id: "...".into() },
//!         variation_id: None,
//!         action: MutationAction::Add,
//!     })
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod mutation;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use mutation::{CartMutator, MutationError, MutationRequest};
pub use pool::{Database, DbConfig};
