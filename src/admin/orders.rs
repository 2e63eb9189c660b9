use std::sync::Arc;

use tracing::{info, instrument};

use crate::api::{ApiError, OrderAdmin};
use crate::bus::{AppBus, AppEvent};
use crate::domain::{Order, OrderStatus};

/// Order management screen operations.
#[derive(Clone)]
pub struct AdminOrders {
    backend: Arc<dyn OrderAdmin>,
    bus: AppBus,
}

impl AdminOrders {
    pub fn new(backend: Arc<dyn OrderAdmin>, bus: AppBus) -> Self {
        Self { backend, bus }
    }

    #[instrument(skip(self))]
    pub async fn list_by_status(&self, statut: OrderStatus) -> Result<Vec<Order>, ApiError> {
        self.backend.orders_by_status(statut).await
    }

    /// Updates the order, then announces the change so dashboards refresh
    /// even when the change feed misses it.
    #[instrument(skip(self))]
    pub async fn set_status(&self, order_id: String, statut: OrderStatus) -> Result<Order, ApiError> {
        let order = self.backend.update_order_status(&order_id, statut).await?;
        info!("Order status changed");
        self.bus.publish(AppEvent::OrderStatusChanged { order_id, statut });
        Ok(order)
    }

    /// Deletes the order and announces it like a status change.
    #[instrument(skip(self))]
    pub async fn delete_order(&self, order_id: String) -> Result<(), ApiError> {
        self.backend.remove_order(&order_id).await?;
        info!("Order deleted");
        self.bus.publish(AppEvent::OrderDeleted { order_id });
        Ok(())
    }
}
