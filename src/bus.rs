//! In-process publish/subscribe for cross-component signals.

use tokio::sync::broadcast;
use tracing::debug;

use crate::domain::OrderStatus;

#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// An admin changed an order's status by hand.
    OrderStatusChanged { order_id: String, statut: OrderStatus },
    /// An admin deleted an order.
    OrderDeleted { order_id: String },
}

#[derive(Debug, Clone)]
pub struct AppBus {
    sender: broadcast::Sender<AppEvent>,
}

impl AppBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: AppEvent) {
        if self.sender.send(event).is_err() {
            debug!("App event published with no listener");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn listeners_receive_published_events() {
        let bus = AppBus::new(4);
        let mut rx = bus.subscribe();
        bus.publish(AppEvent::OrderStatusChanged {
            order_id: "commande_1".into(),
            statut: OrderStatus::Livree,
        });
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, AppEvent::OrderStatusChanged { statut: OrderStatus::Livree, .. }));
    }
}
