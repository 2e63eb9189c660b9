//! Data-access seams shared by the in-memory store and the HTTP API.
//!
//! The storefront and admin components only see these traits, so the same
//! reconciliation code runs against the actors in tests and against the
//! deployed `/api` routes in production.

pub mod http;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Order, OrderCreate, OrderStatus, Product};

pub use http::HttpApi;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    /// The server refused the request against current state (e.g. stock).
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

/// Reads a single product with its variants.
#[async_trait]
pub trait ProductSource: Send + Sync {
    async fn fetch_product(&self, id: &str) -> Result<Product, ApiError>;
}

/// Reads orders for the admin dashboard.
#[async_trait]
pub trait OrderSource: Send + Sync {
    async fn orders_by_status(&self, statut: OrderStatus) -> Result<Vec<Order>, ApiError>;
}

/// The order-submission endpoint: re-validates stock, decrements it and
/// creates the order in one step.
#[async_trait]
pub trait OrderSubmitter: Send + Sync {
    async fn submit_order(&self, order: OrderCreate) -> Result<Order, ApiError>;
}

/// Admin-side order mutations.
#[async_trait]
pub trait OrderAdmin: OrderSource {
    async fn update_order_status(&self, id: &str, statut: OrderStatus) -> Result<Order, ApiError>;
    async fn remove_order(&self, id: &str) -> Result<(), ApiError>;
}
