//! # Repository Layer
//!
//! SQL operations grouped by aggregate.
//!
//! Every function here takes a `&mut SqliteConnection` rather than the pool:
//! the cart mutation composes several repositories inside ONE transaction,
//! so the caller owns the connection/transaction lifetime and the
//! repositories stay oblivious to commit/rollback concerns.

pub mod cart;
pub mod catalog;
pub mod points;
pub mod stock;
pub mod tier;
