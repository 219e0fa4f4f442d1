//! Purchase history endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use store::PurchaseRecord;

use super::auth::Caller;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct PurchasesResponse {
    pub purchases: Vec<PurchaseRecord>,
    pub count: usize,
}

/// GET /purchases: the caller's purchases, newest first.
#[tracing::instrument(skip(state))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    Caller(buyer): Caller,
) -> Result<Json<PurchasesResponse>, ApiError> {
    let purchases = state.ledger.list_for_buyer(&buyer).await?;
    Ok(Json(PurchasesResponse {
        count: purchases.len(),
        purchases,
    }))
}
