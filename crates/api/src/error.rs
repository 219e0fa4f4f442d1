//! API error types with HTTP response mapping.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use domain::DomainError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// No caller identity on the request.
    Unauthorized,
    /// Bad request from the client.
    BadRequest(String),
    /// Cart or listing service error.
    Domain(DomainError),
    /// Request-level checkout error.
    Checkout(CheckoutError),
    /// Direct store error.
    Store(StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Store(err) => store_error_to_response(err),
        };

        if status.is_server_error() {
            tracing::error!(error = %message, "internal server error");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    let status = match &err {
        DomainError::BadRequest(_)
        | DomainError::ItemUnavailable(_)
        | DomainError::InsufficientStock { .. } => StatusCode::BAD_REQUEST,
        DomainError::ItemNotFound(_) => StatusCode::NOT_FOUND,
        DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
        DomainError::Conflict(_) => StatusCode::CONFLICT,
        DomainError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, String) {
    match &err {
        CheckoutError::EmptyRequest => (StatusCode::BAD_REQUEST, err.to_string()),
        CheckoutError::IntentNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        CheckoutError::AlreadyResolved(_) | CheckoutError::StockCommitted(_) => {
            (StatusCode::CONFLICT, err.to_string())
        }
        CheckoutError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

fn store_error_to_response(err: StoreError) -> (StatusCode, String) {
    match &err {
        StoreError::ItemNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use store::{ItemId, PurchaseId};

    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn taxonomy_maps_to_status_codes() {
        let id = ItemId::new("I1");
        assert_eq!(status_of(ApiError::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(DomainError::ItemNotFound(id.clone()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(DomainError::ItemUnavailable(id.clone()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(
                DomainError::InsufficientStock {
                    item_id: id.clone(),
                    requested: 2,
                    available: 1
                }
                .into()
            ),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(DomainError::Forbidden(id.clone()).into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(DomainError::Conflict("stale".to_string()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(CheckoutError::EmptyRequest.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(CheckoutError::IntentNotFound(PurchaseId::new()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(CheckoutError::StockCommitted(PurchaseId::new()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(StoreError::Unavailable("down".to_string()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
