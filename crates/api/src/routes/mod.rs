//! HTTP route handlers.

pub mod auth;
pub mod cart;
pub mod health;
pub mod items;
pub mod metrics;
pub mod purchases;
pub mod reconciliation;

use serde::Serialize;

/// Plain confirmation body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
