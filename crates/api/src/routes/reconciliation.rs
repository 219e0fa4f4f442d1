//! Reconciliation gap report and manual resolution for operations.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use checkout::ReconciliationGap;
use serde::{Deserialize, Serialize};
use store::{IntentState, PurchaseId};

use super::auth::Caller;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct GapsResponse {
    pub gaps: Vec<ReconciliationGap>,
    pub count: usize,
}

/// GET /reconciliation/gaps: unfinished checkouts older than the window.
pub async fn gaps(State(state): State<Arc<AppState>>) -> Result<Json<GapsResponse>, ApiError> {
    let gaps = state.reconciliation.scan().await?;
    Ok(Json(GapsResponse {
        count: gaps.len(),
        gaps,
    }))
}

/// Operator's verdict on an unfinished checkout.
#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    /// Whether the stock decrement is known to have committed.
    pub committed: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResponse {
    pub message: String,
    pub purchase_id: PurchaseId,
    pub state: IntentState,
}

/// POST /reconciliation/gaps/{purchaseId}/resolve: settle a gap by hand.
#[tracing::instrument(skip(state, purchase_id, payload))]
pub async fn resolve(
    State(state): State<Arc<AppState>>,
    Caller(operator): Caller,
    purchase_id: Result<Path<PurchaseId>, PathRejection>,
    payload: Result<Json<ResolveRequest>, JsonRejection>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let Path(purchase_id) = purchase_id?;
    let Json(request) = payload?;

    let intent = state
        .reconciliation
        .resolve(purchase_id, request.committed)
        .await?;
    tracing::info!(
        %operator,
        %purchase_id,
        committed = request.committed,
        "Gap resolved by operator"
    );

    Ok(Json(ResolveResponse {
        message: format!("Checkout {purchase_id} resolved"),
        purchase_id,
        state: intent.state,
    }))
}
