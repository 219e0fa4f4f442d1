//! Seller listing endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain::{ItemPatch, NewListing};
use store::{Item, ItemId};

use super::MessageResponse;
use super::auth::Caller;
use crate::error::ApiError;
use crate::state::AppState;

/// POST /items: create a listing owned by the caller.
#[tracing::instrument(skip(state, payload))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Caller(seller): Caller,
    payload: Result<Json<NewListing>, JsonRejection>,
) -> Result<(StatusCode, Json<Item>), ApiError> {
    let Json(listing) = payload?;
    let item = state.listings.create_listing(&seller, listing).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// GET /items/{id}: read a listing.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<ItemId>,
) -> Result<Json<Item>, ApiError> {
    Ok(Json(state.listings.get_listing(&item_id).await?))
}

/// PATCH /items/{id}: edit a listing the caller owns.
#[tracing::instrument(skip(state, payload))]
pub async fn update(
    State(state): State<Arc<AppState>>,
    Caller(seller): Caller,
    Path(item_id): Path<ItemId>,
    payload: Result<Json<ItemPatch>, JsonRejection>,
) -> Result<Json<Item>, ApiError> {
    let Json(patch) = payload?;
    let item = state
        .listings
        .update_listing(&seller, &item_id, patch)
        .await?;
    Ok(Json(item))
}

/// DELETE /items/{id}: delete a listing the caller owns.
#[tracing::instrument(skip(state))]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Caller(seller): Caller,
    Path(item_id): Path<ItemId>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.listings.delete_listing(&seller, &item_id).await?;
    Ok(Json(MessageResponse::new("Item deleted successfully")))
}
