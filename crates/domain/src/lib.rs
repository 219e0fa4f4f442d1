//! Caller-side services of the marketplace.
//!
//! - [`CartService`]: the cart-add entry point, validated against the live
//!   catalog, plus cart listing and removal
//! - [`ListingService`]: seller-side create, update and delete of catalog
//!   items, with ownership checks and version-conditioned writes
//!
//! Checkout itself lives in the `checkout` crate.

pub mod cart;
pub mod error;
pub mod listing;

pub use cart::{AddToCart, CartService};
pub use error::{DomainError, Result};
pub use listing::{ItemPatch, ListingService, MAX_UPDATE_ATTEMPTS, NewListing};
