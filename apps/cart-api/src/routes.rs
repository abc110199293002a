//! # Routes
//!
//! The single mutation endpoint this service exposes, plus a health probe.
//!
//! ## The Mutation Endpoint
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PATCH /carts/{cart_id}/lines                                           │
//! │  x-organization-id: <tenant>                                            │
//! │                                                                         │
//! │  { "productId": "...", "variationId": null,                             │
//! │    "action": "add", "quantity": 1 }                                     │
//! │        - or -                                                           │
//! │  { "affiliateProductId": "...", "action": "subtract" }                  │
//! │                                                                         │
//! │  200 → { "lines": [ { id, title, description, image, sku, quantity,     │
//! │                       unitPrice, variationId, isAffiliate, subtotal     │
//! │                     }, ... ] }                                          │
//! │  4xx/5xx → { "code": "...", "message": "..." }                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Body validation happens here, before any transaction opens; everything
//! transactional lives in `merx_db::mutation`.

use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;
use merx_core::{
    validation, CartSnapshot, LineRef, MutationAction, ValidationError,
};
use merx_db::MutationRequest;

/// Builds the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/carts/{cart_id}/lines", patch(mutate_cart_line))
        .with_state(state)
}

// =============================================================================
// Organization Context
// =============================================================================

/// The calling organization, resolved from the session context.
///
/// The surrounding platform authenticates the session and forwards the
/// tenant as the `x-organization-id` header; every query downstream is
/// scoped by it.
#[derive(Debug, Clone)]
pub struct OrgContext(pub String);

impl<S> FromRequestParts<S> for OrgContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get("x-organization-id")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| OrgContext(v.to_string()))
            .ok_or_else(|| {
                ApiError::validation(ValidationError::Required {
                    field: "x-organization-id".to_string(),
                })
            })
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Request body for the line mutation endpoint.
///
/// Exactly one of `product_id` / `affiliate_product_id` must be present.
/// `quantity` defaults to 1 and is bounded; N units run as N single-unit
/// steps inside one transaction.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutateLineRequest {
    pub product_id: Option<String>,
    pub affiliate_product_id: Option<String>,
    pub variation_id: Option<String>,
    pub action: MutationAction,
    pub quantity: Option<i64>,
}

impl MutateLineRequest {
    /// Validates the body and lifts it into the engine's request type.
    fn into_mutation(
        self,
        cart_id: String,
        organization_id: String,
    ) -> Result<(MutationRequest, i64), ApiError> {
        let line = match (self.product_id, self.affiliate_product_id) {
            (Some(product_id), None) => {
                validation::validate_id("productId", &product_id).map_err(ApiError::validation)?;
                LineRef::Product { product_id }
            }
            (None, Some(affiliate_product_id)) => {
                validation::validate_id("affiliateProductId", &affiliate_product_id)
                    .map_err(ApiError::validation)?;
                LineRef::Affiliate {
                    affiliate_product_id,
                }
            }
            _ => {
                return Err(ApiError::validation(ValidationError::MutuallyExclusive {
                    first: "productId".to_string(),
                    second: "affiliateProductId".to_string(),
                }))
            }
        };

        if let Some(variation_id) = self.variation_id.as_deref() {
            validation::validate_id("variationId", variation_id).map_err(ApiError::validation)?;
        }

        let quantity = self.quantity.unwrap_or(1);
        validation::validate_batch_quantity(quantity).map_err(ApiError::validation)?;

        Ok((
            MutationRequest {
                cart_id,
                organization_id,
                line,
                variation_id: self.variation_id,
                action: self.action,
            },
            quantity,
        ))
    }
}

/// Applies a cart line mutation and returns the committed snapshot.
#[tracing::instrument(name = "PATCH /carts/{cart_id}/lines", skip(state, body))]
async fn mutate_cart_line(
    State(state): State<AppState>,
    OrgContext(organization_id): OrgContext,
    Path(cart_id): Path<String>,
    Json(body): Json<MutateLineRequest>,
) -> Result<Json<CartSnapshot>, ApiError> {
    validation::validate_id("cartId", &cart_id).map_err(ApiError::validation)?;

    let (request, quantity) = body.into_mutation(cart_id, organization_id)?;

    let snapshot = state.mutator.mutate_many(&request, quantity).await?;

    Ok(Json(snapshot))
}

/// Liveness/readiness probe.
async fn health(State(state): State<AppState>) -> Result<&'static str, ApiError> {
    if state.db.health_check().await {
        Ok("ok")
    } else {
        Err(merx_db::DbError::ConnectionFailed("health check failed".to_string()).into())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn body(product: Option<&str>, affiliate: Option<&str>) -> MutateLineRequest {
        MutateLineRequest {
            product_id: product.map(String::from),
            affiliate_product_id: affiliate.map(String::from),
            variation_id: None,
            action: MutationAction::Add,
            quantity: None,
        }
    }

    #[test]
    fn test_exactly_one_catalog_reference_required() {
        let both = body(Some("p-1"), Some("a-1"))
            .into_mutation("cart-1".to_string(), "org-1".to_string());
        assert!(both.is_err());

        let neither = body(None, None).into_mutation("cart-1".to_string(), "org-1".to_string());
        assert!(neither.is_err());
    }

    #[test]
    fn test_quantity_defaults_to_one() {
        let (request, quantity) = body(Some("p-1"), None)
            .into_mutation("cart-1".to_string(), "org-1".to_string())
            .unwrap();

        assert_eq!(quantity, 1);
        assert!(matches!(request.line, LineRef::Product { .. }));
    }

    #[test]
    fn test_out_of_range_quantity_rejected() {
        let mut b = body(Some("p-1"), None);
        b.quantity = Some(0);
        assert!(b
            .into_mutation("cart-1".to_string(), "org-1".to_string())
            .is_err());
    }
}
