//! # Validation Module
//!
//! Request validation for the mutation endpoint.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP deserialization (serde)                                  │
//! │  └── Type/shape checks, unknown action values rejected                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - before any transaction opens                    │
//! │  └── Id presence/length, batch quantity bounds, xor of product refs     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database constraints                                          │
//! │  └── CHECK/UNIQUE/FK constraints as the last line of defense            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::MAX_BATCH_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates a catalog/cart/variation id.
///
/// ## Rules
/// - Must not be empty after trimming
/// - Must be at most 64 characters (UUID strings are 36)
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    let id = id.trim();

    if id.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if id.len() > 64 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 64,
        });
    }

    Ok(())
}

/// Validates an ISO country code (two or three letters).
pub fn validate_country(country: &str) -> ValidationResult<()> {
    let country = country.trim();

    if country.is_empty() {
        return Err(ValidationError::Required {
            field: "country".to_string(),
        });
    }

    if !(2..=3).contains(&country.len()) || !country.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::InvalidFormat {
            field: "country".to_string(),
            reason: "must be a 2-3 letter ISO code".to_string(),
        });
    }

    Ok(())
}

/// Validates the batch quantity for a mutation request.
///
/// The engine applies one unit per internal step; the public endpoint
/// accepts a bounded count of steps per request.
pub fn validate_batch_quantity(quantity: i64) -> ValidationResult<()> {
    if !(1..=MAX_BATCH_QUANTITY).contains(&quantity) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_BATCH_QUANTITY,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(validate_id("productId", "p-1").is_ok());
        assert!(validate_id("productId", "  ").is_err());
        assert!(validate_id("productId", &"a".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_country() {
        assert!(validate_country("US").is_ok());
        assert!(validate_country("dnk").is_ok());
        assert!(validate_country("").is_err());
        assert!(validate_country("U1").is_err());
        assert!(validate_country("USAX").is_err());
    }

    #[test]
    fn test_validate_batch_quantity() {
        assert!(validate_batch_quantity(1).is_ok());
        assert!(validate_batch_quantity(MAX_BATCH_QUANTITY).is_ok());
        assert!(validate_batch_quantity(0).is_err());
        assert!(validate_batch_quantity(-1).is_err());
        assert!(validate_batch_quantity(MAX_BATCH_QUANTITY + 1).is_err());
    }
}
