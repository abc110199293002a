//! # API Error Type
//!
//! Unified error type for HTTP responses.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Cart API                           │
//! │                                                                         │
//! │  CartMutator returns MutationError                                      │
//! │       │                                                                 │
//! │       ├── Domain(CartNotFound | LineNotFound)        → 404              │
//! │       ├── Domain(SharedProductForbiddenInPos)        → 403              │
//! │       ├── Domain(Validation)                         → 400              │
//! │       ├── Domain(other business rule)                → 400              │
//! │       ├── Db(Busy)                                   → 503 (retryable)  │
//! │       └── Db(anything else)  → logged, internals redacted → 500         │
//! │                                                                         │
//! │  Response body: { "code": "...", "message": "..." }                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use merx_core::{CoreError, ValidationError};
use merx_db::{DbError, MutationError};

/// API error returned from handlers.
///
/// ## Serialization
/// This is what the HTTP caller receives when a request fails:
/// ```json
/// {
///   "code": "INSUFFICIENT_POINTS",
///   "message": "Insufficient points: required 10, available 5"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling.
    pub code: ErrorCode,

    /// Human-readable error message for display.
    pub message: String,

    /// HTTP status, not serialized into the body.
    #[serde(skip)]
    pub status: StatusCode,
}

/// Error codes for API responses, one per failure kind the engine can
/// surface.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Cart or line not found (404).
    NotFound,

    /// Malformed request body (400).
    ValidationError,

    /// Client level does not qualify for the affiliate product (400).
    LevelNotEligible,

    /// Point balance cannot cover the reservation (400).
    InsufficientPoints,

    /// Quantity would go negative (400).
    NegativeQuantity,

    /// No price configured for the product/country (400).
    PricingNotFound,

    /// No point cost configured for the affiliate product (400).
    NoPointsPrice,

    /// Out of stock with backorder disabled (400).
    InsufficientStock,

    /// Cross-tenant product on a POS cart (403).
    SharedProductForbidden,

    /// The database was busy; the caller may retry (503).
    Retry,

    /// Unexpected internal failure (500).
    Internal,
}

impl ApiError {
    fn new(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            status,
        }
    }

    /// A 400 validation failure, used before any transaction opens.
    pub fn validation(err: ValidationError) -> Self {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            ErrorCode::ValidationError,
            err.to_string(),
        )
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let (status, code) = match &err {
            CoreError::CartNotFound(_) | CoreError::LineNotFound { .. } => {
                (StatusCode::NOT_FOUND, ErrorCode::NotFound)
            }
            CoreError::SharedProductForbiddenInPos { .. } => {
                (StatusCode::FORBIDDEN, ErrorCode::SharedProductForbidden)
            }
            CoreError::LevelNotEligible { .. } => {
                (StatusCode::BAD_REQUEST, ErrorCode::LevelNotEligible)
            }
            CoreError::InsufficientPoints { .. } => {
                (StatusCode::BAD_REQUEST, ErrorCode::InsufficientPoints)
            }
            CoreError::NegativeQuantity { .. } => {
                (StatusCode::BAD_REQUEST, ErrorCode::NegativeQuantity)
            }
            CoreError::PricingNotFound { .. } => {
                (StatusCode::BAD_REQUEST, ErrorCode::PricingNotFound)
            }
            CoreError::NoPointsPriceConfigured { .. } => {
                (StatusCode::BAD_REQUEST, ErrorCode::NoPointsPrice)
            }
            CoreError::InsufficientStock { .. } => {
                (StatusCode::BAD_REQUEST, ErrorCode::InsufficientStock)
            }
            CoreError::Validation(_) => (StatusCode::BAD_REQUEST, ErrorCode::ValidationError),
        };

        ApiError::new(status, code, err.to_string())
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Busy => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorCode::Retry,
                "The cart is busy, please retry",
            ),
            other => {
                // Infrastructure details stay in the logs, not the body.
                error!(error = %other, "Database failure during cart mutation");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Internal,
                    "Internal server error",
                )
            }
        }
    }
}

impl From<MutationError> for ApiError {
    fn from(err: MutationError) -> Self {
        match err {
            MutationError::Domain(core) => core.into(),
            MutationError::Db(db) => db.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let err: ApiError = CoreError::CartNotFound("cart-1".to_string()).into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_pos_guard_maps_to_403() {
        let err: ApiError = CoreError::SharedProductForbiddenInPos {
            catalog_id: "aff-1".to_string(),
        }
        .into();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_business_rule_maps_to_400_with_message() {
        let err: ApiError = CoreError::InsufficientPoints {
            required: 10,
            available: 5,
        }
        .into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("required 10"));
    }

    #[test]
    fn test_internal_error_is_redacted() {
        let err: ApiError = DbError::QueryFailed("secret table detail".to_string()).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("secret"));
    }

    #[test]
    fn test_busy_is_retryable_503() {
        let err: ApiError = DbError::Busy.into();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
