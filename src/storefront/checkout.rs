use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use super::cart::{CartError, CartStore};
use super::reconciler::{assess_line, validate_cart, ValidationReport};
use crate::api::{ApiError, OrderSubmitter, ProductSource};
use crate::domain::{Customer, Order, OrderCreate};

#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The persisted cart has not been restored yet.
    #[error("Panier en cours de chargement")]
    CartNotLoaded,
    #[error("Panier vide")]
    EmptyCart,
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Stock insuffisant: {} article(s) bloquant(s)", .0.errors().len())]
    Stock(ValidationReport),
    #[error("Order submission failed: {0}")]
    Submission(#[source] ApiError),
    #[error(transparent)]
    Cart(#[from] CartError),
}

/// Turns the visitor's cart into an order.
pub struct Checkout {
    products: Arc<dyn ProductSource>,
    submitter: Arc<dyn OrderSubmitter>,
}

impl Checkout {
    pub fn new(products: Arc<dyn ProductSource>, submitter: Arc<dyn OrderSubmitter>) -> Self {
        Self { products, submitter }
    }

    /// Validates stock for every line, then submits. The cart is cleared only
    /// once the order exists.
    #[instrument(skip(self, cart, customer), fields(lines = cart.lines().len()))]
    pub async fn submit(&self, cart: &mut CartStore, customer: Customer) -> Result<Order, CheckoutError> {
        if !cart.is_loaded() {
            return Err(CheckoutError::CartNotLoaded);
        }
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        customer.validate().map_err(CheckoutError::Validation)?;

        let report = validate_cart(Arc::clone(&self.products), cart.lines()).await;
        if !report.can_submit() {
            warn!(errors = report.errors().len(), "Checkout blocked by stock");
            return Err(CheckoutError::Stock(report));
        }

        let order = OrderCreate {
            customer,
            lignes: cart.lines().iter().map(|line| line.to_order_line()).collect(),
        };
        let created = self.submitter.submit_order(order).await.map_err(|e| {
            error!(error = %e, "Order submission rejected");
            CheckoutError::Submission(e)
        })?;

        cart.clear().await?;
        info!(order_id = %created.id, total = created.total, "Checkout complete");
        Ok(created)
    }

    /// Re-reads stock for lines whose snapshot is older than `max_age` and
    /// returns how many were refreshed. Unreachable products keep their
    /// old snapshot.
    #[instrument(skip(self, cart))]
    pub async fn refresh_snapshots(&self, cart: &mut CartStore, max_age: Duration) -> Result<usize, CheckoutError> {
        let max_age = chrono::Duration::from_std(max_age).unwrap_or_else(|_| chrono::Duration::weeks(52));
        let stale: Vec<_> = cart
            .stale_lines(Utc::now(), max_age)
            .into_iter()
            .filter_map(|key| cart.get(&key).cloned())
            .collect();

        let mut refreshed = 0;
        for line in stale {
            match self.products.fetch_product(&line.produit_id).await {
                Ok(product) => {
                    let (availability, _) = assess_line(&product, &line);
                    if cart.refresh_snapshot(&line.key(), availability.as_snapshot()).await? {
                        refreshed += 1;
                    }
                }
                Err(e) => warn!(product_id = %line.produit_id, error = %e, "Snapshot refresh skipped"),
            }
        }
        if refreshed > 0 {
            info!(refreshed, "Stale stock snapshots refreshed");
        }
        Ok(refreshed)
    }
}
