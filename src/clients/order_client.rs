use async_trait::async_trait;
use tracing::{error, info, instrument, warn};

use crate::actor_framework::{ResourceClient, RowFilter};
use crate::api::{ApiError, OrderAdmin, OrderSource, OrderSubmitter};
use crate::clients::ProductClient;
use crate::domain::{Order, OrderCreate, OrderLine, OrderPatch, OrderStatus, StockDraw};
use crate::order_actor::OrderError;
use crate::product_actor::{ProductError, StockSelection};

/// Client for interacting with the Order actor.
///
/// `submit_order` is the in-process counterpart of `POST /api/commandes`:
/// the only place stock is decremented.
#[derive(Clone)]
pub struct OrderClient {
    inner: ResourceClient<Order>,
    product_client: ProductClient,
}

impl OrderClient {
    pub fn new(inner: ResourceClient<Order>, product_client: ProductClient) -> Self {
        Self { inner, product_client }
    }

    /// Re-validates and reserves stock for every line, then creates the order.
    ///
    /// Reservations are all-or-nothing: if any line is refused, lines already
    /// reserved are released before the error is returned.
    #[instrument(skip(self, order), fields(lignes = order.lignes.len()))]
    pub async fn submit_order(&self, mut order: OrderCreate) -> Result<Order, OrderError> {
        info!("Processing submit_order request");

        order.customer.validate().map_err(OrderError::ValidationError)?;
        if order.lignes.is_empty() {
            return Err(OrderError::ValidationError("commande sans article".to_string()));
        }
        if let Some(line) = order.lignes.iter().find(|l| l.quantite == 0) {
            return Err(OrderError::ValidationError(format!(
                "quantité nulle pour {}",
                line.produit_id
            )));
        }

        let mut reserved: Vec<(String, StockDraw)> = Vec::new();
        let mut prices = Vec::with_capacity(order.lignes.len());
        for line in &order.lignes {
            match self.reserve_line(line).await {
                Ok((prix, draw)) => {
                    reserved.push((line.produit_id.clone(), draw));
                    prices.push(prix);
                }
                Err(e) => {
                    error!(error = %e, product_id = %line.produit_id, "Stock reservation failed");
                    self.release_lines(reserved).await;
                    return Err(e);
                }
            }
        }

        // Totals come from catalog prices, not the client's snapshot.
        for (line, prix) in order.lignes.iter_mut().zip(prices) {
            line.prix = prix;
        }

        let id = match self.inner.create(order.clone()).await {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "Order creation failed after reservation");
                self.release_lines(reserved).await;
                return Err(e.into());
            }
        };

        let created = self
            .inner
            .get(id.clone())
            .await?
            .ok_or_else(|| OrderError::NotFound(id.clone()))?;
        info!(order_id = %id, total = created.total, "Order created, confirmation email queued");
        Ok(created)
    }

    async fn reserve_line(&self, line: &OrderLine) -> Result<(f64, StockDraw), OrderError> {
        let product = self
            .product_client
            .get_product(line.produit_id.clone())
            .await
            .map_err(|e| OrderError::ActorCommunicationError(e.to_string()))?
            .ok_or_else(|| OrderError::InvalidProduct(line.produit_id.clone()))?;

        let selection = StockSelection::new(line.couleur.as_deref(), line.taille.as_deref(), line.quantite);
        match self.product_client.reserve_stock(line.produit_id.clone(), selection).await {
            Ok(draw) => Ok((product.prix, draw)),
            Err(ProductError::InsufficientStock { requested, available }) => {
                Err(OrderError::InsufficientStock {
                    produit: product.nom,
                    requested,
                    available,
                })
            }
            Err(ProductError::NotFound(id)) => Err(OrderError::InvalidProduct(id)),
            Err(e) => Err(OrderError::ActorCommunicationError(e.to_string())),
        }
    }

    async fn release_lines(&self, reserved: Vec<(String, StockDraw)>) {
        for (produit_id, draw) in reserved {
            if draw.is_empty() {
                continue;
            }
            if let Err(e) = self.product_client.release_stock(produit_id.clone(), draw).await {
                warn!(error = %e, product_id = %produit_id, "Failed to release reserved stock");
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn set_status(&self, id: String, statut: OrderStatus) -> Result<Order, OrderError> {
        info!("Updating order status");
        Ok(self.inner.update(id, OrderPatch { statut }).await?)
    }

    #[instrument(skip(self))]
    pub async fn list_by_status(&self, statut: OrderStatus) -> Result<Vec<Order>, OrderError> {
        let mut orders = self.inner.list(RowFilter::new(move |o: &Order| o.statut == statut)).await?;
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}

impl_client_methods!(OrderClient, Order, OrderError, order);

fn to_api_error(e: OrderError) -> ApiError {
    match e {
        OrderError::NotFound(id) | OrderError::InvalidProduct(id) => ApiError::NotFound(id),
        OrderError::InsufficientStock { .. } => ApiError::Conflict(e.to_string()),
        OrderError::ValidationError(msg) => ApiError::Validation(msg),
        OrderError::ActorCommunicationError(msg) => ApiError::Unavailable(msg),
    }
}

#[async_trait]
impl OrderSubmitter for OrderClient {
    async fn submit_order(&self, order: OrderCreate) -> Result<Order, ApiError> {
        OrderClient::submit_order(self, order).await.map_err(to_api_error)
    }
}

#[async_trait]
impl OrderSource for OrderClient {
    async fn orders_by_status(&self, statut: OrderStatus) -> Result<Vec<Order>, ApiError> {
        self.list_by_status(statut).await.map_err(to_api_error)
    }
}

#[async_trait]
impl OrderAdmin for OrderClient {
    async fn update_order_status(&self, id: &str, statut: OrderStatus) -> Result<Order, ApiError> {
        self.set_status(id.to_string(), statut).await.map_err(to_api_error)
    }

    async fn remove_order(&self, id: &str) -> Result<(), ApiError> {
        self.delete_order(id.to_string()).await.map_err(to_api_error)
    }
}
