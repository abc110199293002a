//! # Cart Fingerprint
//!
//! Deterministic digest over a cart's line contents.
//!
//! Downstream collaborators (checkout, order review) keep the last hash they
//! saw and compare it against `cart_updated_hash` to detect whether the cart
//! changed since their read - without diffing line rows. The digest covers
//! exactly what those consumers care about: which catalog entries are in the
//! cart, in what quantity, at what unit price.

use sha2::{Digest, Sha256};

use crate::types::{CartLine, LineRef};

/// Computes the integrity fingerprint for a set of cart lines.
///
/// The digest is SHA-256 over the canonical tuple
/// `(kind, catalog_id, variation_id, quantity, unit_price)` per line,
/// sorted by identity key - so it is insensitive to SQL row order but
/// changes on any quantity, price, addition, or removal. An empty cart has
/// a well-defined fingerprint too (the digest of zero tuples).
pub fn cart_fingerprint(lines: &[CartLine]) -> String {
    let mut tuples: Vec<(u8, &str, &str, i64, i64)> = lines
        .iter()
        .map(|line| {
            let kind = match line.line {
                LineRef::Product { .. } => 0u8,
                LineRef::Affiliate { .. } => 1u8,
            };
            (
                kind,
                line.line.catalog_id(),
                line.variation_id.as_deref().unwrap_or(""),
                line.quantity,
                line.unit_price,
            )
        })
        .collect();
    tuples.sort();

    let mut hasher = Sha256::new();
    for (kind, catalog_id, variation_id, quantity, unit_price) in tuples {
        hasher.update([kind]);
        hasher.update(catalog_id.as_bytes());
        hasher.update([0x1f]);
        hasher.update(variation_id.as_bytes());
        hasher.update([0x1f]);
        hasher.update(quantity.to_be_bytes());
        hasher.update(unit_price.to_be_bytes());
        hasher.update([0x0a]);
    }

    hex::encode(hasher.finalize())
}
