use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::actor_framework::{ResourceClient, RowFilter};
use crate::api::{ApiError, ProductSource};
use crate::domain::{Availability, Product, ProductCreate, ProductPatch, StockDraw};
use crate::product_actor::{ProductAction, ProductActionResult, ProductError, StockSelection};

/// Client for interacting with the Product actor.
#[derive(Clone)]
pub struct ProductClient {
    inner: ResourceClient<Product>,
}

impl_basic_client!(ProductClient, Product, ProductError, product);

impl ProductClient {
    #[instrument(skip(self, params), fields(nom = %params.nom))]
    pub async fn create_product(&self, params: ProductCreate) -> Result<String, ProductError> {
        debug!("Sending request");
        Ok(self.inner.create(params).await?)
    }

    /// Admin edit (PUT /api/admin/produits).
    #[instrument(skip(self))]
    pub async fn update_product(&self, id: String, patch: ProductPatch) -> Result<Product, ProductError> {
        debug!("Sending request");
        Ok(self.inner.update(id, patch).await?)
    }

    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<Product>, ProductError> {
        debug!("Sending request");
        Ok(self.inner.list(RowFilter::all()).await?)
    }

    #[instrument(skip(self))]
    pub async fn check_stock(
        &self,
        id: String,
        couleur: Option<String>,
        taille: Option<String>,
    ) -> Result<Availability, ProductError> {
        debug!("Sending request");
        match self.inner.perform_action(id, ProductAction::CheckStock { couleur, taille }).await? {
            ProductActionResult::StockLevel(level) => Ok(level),
            other => Err(unexpected(other)),
        }
    }

    /// Atomically checks and decrements stock for one selection, returning
    /// the counters that were taken.
    #[instrument(skip(self), fields(product_id = %id, quantite = selection.quantite))]
    pub async fn reserve_stock(&self, id: String, selection: StockSelection) -> Result<StockDraw, ProductError> {
        debug!("Sending request");
        let requested = selection.quantite;
        match self.inner.perform_action(id, ProductAction::Reserve(selection)).await? {
            ProductActionResult::Reserved(draw) => Ok(draw),
            ProductActionResult::Shortage { available } => {
                warn!(requested, available, "Reservation refused");
                Err(ProductError::InsufficientStock { requested, available })
            }
            other => Err(unexpected(other)),
        }
    }

    #[instrument(skip(self, draw), fields(product_id = %id))]
    pub async fn release_stock(&self, id: String, draw: StockDraw) -> Result<(), ProductError> {
        debug!("Sending request");
        match self.inner.perform_action(id, ProductAction::Release(draw)).await? {
            ProductActionResult::Released => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(result: ProductActionResult) -> ProductError {
    ProductError::ActorCommunicationError(format!("Unexpected result: {:?}", result))
}

#[async_trait]
impl ProductSource for ProductClient {
    async fn fetch_product(&self, id: &str) -> Result<Product, ApiError> {
        match self.get_product(id.to_string()).await {
            Ok(Some(product)) => Ok(product),
            Ok(None) => Err(ApiError::NotFound(id.to_string())),
            Err(e) => Err(ApiError::Unavailable(e.to_string())),
        }
    }
}
