//! Cart and checkout endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use checkout::CheckoutRequest;
use domain::AddToCart;
use serde::{Deserialize, Serialize};
use store::{CartEntry, ItemId};
use tokio::time::Instant;

use super::MessageResponse;
use super::auth::Caller;
use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    #[serde(default)]
    pub item_ids: Vec<ItemId>,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartResponse {
    pub items: Vec<CartEntry>,
    pub count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartResponse {
    pub message: String,
    pub cart_item: CartEntry,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub message: String,
    pub purchases_created: Vec<String>,
    pub errors: Vec<String>,
}

// -- Handlers --

/// GET /cart: the caller's live cart entries.
#[tracing::instrument(skip(state))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    Caller(buyer): Caller,
) -> Result<Json<CartResponse>, ApiError> {
    let items = state.carts.list_cart(&buyer).await?;
    Ok(Json(CartResponse {
        count: items.len(),
        items,
    }))
}

/// POST /cart: add an item to the caller's cart.
#[tracing::instrument(skip(state, payload))]
pub async fn add(
    State(state): State<Arc<AppState>>,
    Caller(buyer): Caller,
    payload: Result<Json<AddToCart>, JsonRejection>,
) -> Result<Json<AddToCartResponse>, ApiError> {
    let Json(request) = payload?;
    let entry = state.carts.add_to_cart(&buyer, request).await?;
    Ok(Json(AddToCartResponse {
        message: "Item added to cart successfully".to_string(),
        cart_item: entry,
    }))
}

/// DELETE /cart/{itemId}: remove an item from the caller's cart.
#[tracing::instrument(skip(state))]
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Caller(buyer): Caller,
    Path(item_id): Path<ItemId>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.carts.remove_from_cart(&buyer, &item_id).await?;
    Ok(Json(MessageResponse::new("Item removed from cart")))
}

/// POST /cart/checkout: buy the requested cart entries.
///
/// Always 200 once the request itself is valid; per-item failures are
/// listed in `errors`.
#[tracing::instrument(skip(state, payload))]
pub async fn checkout(
    State(state): State<Arc<AppState>>,
    Caller(buyer): Caller,
    payload: Result<Json<CheckoutBody>, JsonRejection>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let Json(body) = payload?;
    let request = CheckoutRequest::new(buyer, body.item_ids)
        .with_deadline(Instant::now() + state.checkout_deadline);

    let result = state.checkout.checkout(request).await?;

    Ok(Json(CheckoutResponse {
        message: "Checkout completed".to_string(),
        purchases_created: result.purchases.iter().map(ToString::to_string).collect(),
        errors: result.error_messages(),
    }))
}
