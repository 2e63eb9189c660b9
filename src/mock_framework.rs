//! # Mock Framework
//!
//! Utilities for testing clients in isolation.
//!
//! Use [`create_mock_client`] to get a client and a receiver.
//! Then use helpers like [`expect_get`] or [`expect_action`] to script replies.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::actor_framework::{Entity, FrameworkError, ResourceClient, ResourceRequest};
use crate::api::{ApiError, OrderAdmin, OrderSource, ProductSource};
use crate::domain::{Order, OrderStatus, Product};

/// Creates a mock client and a receiver for asserting requests.
///
/// The client sends to a channel the test controls, so replies (success,
/// failure, delays) are scripted deterministically without a running actor.
pub fn create_mock_client<T: Entity>(
    buffer_size: usize,
) -> (ResourceClient<T>, mpsc::Receiver<ResourceRequest<T>>) {
    let (sender, receiver) = mpsc::channel(buffer_size);
    (ResourceClient::new(sender), receiver)
}

pub async fn expect_create<T: Entity>(
    receiver: &mut mpsc::Receiver<ResourceRequest<T>>,
) -> Option<(T::CreateParams, oneshot::Sender<Result<T::Id, FrameworkError>>)> {
    match receiver.recv().await {
        Some(ResourceRequest::Create { params, respond_to }) => Some((params, respond_to)),
        _ => None,
    }
}

pub async fn expect_get<T: Entity>(
    receiver: &mut mpsc::Receiver<ResourceRequest<T>>,
) -> Option<(T::Id, oneshot::Sender<Result<Option<T>, FrameworkError>>)> {
    match receiver.recv().await {
        Some(ResourceRequest::Get { id, respond_to }) => Some((id, respond_to)),
        _ => None,
    }
}

pub async fn expect_action<T: Entity>(
    receiver: &mut mpsc::Receiver<ResourceRequest<T>>,
) -> Option<(T::Id, T::Action, oneshot::Sender<Result<T::ActionResult, FrameworkError>>)> {
    match receiver.recv().await {
        Some(ResourceRequest::Action { id, action, respond_to }) => Some((id, action, respond_to)),
        _ => None,
    }
}

/// Product source backed by a map; missing ids are `NotFound`, ids listed in
/// `failing` return a transport error.
#[derive(Default)]
pub struct StaticProducts {
    products: Mutex<HashMap<String, Product>>,
    failing: Vec<String>,
}

impl StaticProducts {
    pub fn new(products: impl IntoIterator<Item = Product>) -> Self {
        Self {
            products: Mutex::new(products.into_iter().map(|p| (p.id.clone(), p)).collect()),
            failing: Vec::new(),
        }
    }

    pub fn failing(mut self, id: impl Into<String>) -> Self {
        self.failing.push(id.into());
        self
    }
}

#[async_trait]
impl ProductSource for StaticProducts {
    async fn fetch_product(&self, id: &str) -> Result<Product, ApiError> {
        if self.failing.iter().any(|f| f == id) {
            return Err(ApiError::Unavailable("network down".to_string()));
        }
        let products = self.products.lock().unwrap();
        products.get(id).cloned().ok_or_else(|| ApiError::NotFound(id.to_string()))
    }
}

/// Order source returning fixed per-status counts of placeholder orders,
/// adjustable between calls, with a call counter.
#[derive(Default)]
pub struct ScriptedOrders {
    pub counts: Mutex<HashMap<OrderStatus, usize>>,
    pub failing: Mutex<Vec<OrderStatus>>,
    pub calls: Mutex<usize>,
}

impl ScriptedOrders {
    pub fn with_counts(counts: &[(OrderStatus, usize)]) -> Self {
        let orders = Self::default();
        orders.set_counts(counts);
        orders
    }

    pub fn set_counts(&self, counts: &[(OrderStatus, usize)]) {
        let mut map = self.counts.lock().unwrap();
        map.clear();
        map.extend(counts.iter().copied());
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl OrderSource for ScriptedOrders {
    async fn orders_by_status(&self, statut: OrderStatus) -> Result<Vec<Order>, ApiError> {
        *self.calls.lock().unwrap() += 1;
        if self.failing.lock().unwrap().contains(&statut) {
            return Err(ApiError::Unavailable("timeout".to_string()));
        }
        let n = self.counts.lock().unwrap().get(&statut).copied().unwrap_or(0);
        Ok((0..n).map(|i| placeholder_order(i, statut)).collect())
    }
}

/// Admin mutations always succeed and change nothing.
#[async_trait]
impl OrderAdmin for ScriptedOrders {
    async fn update_order_status(&self, id: &str, statut: OrderStatus) -> Result<Order, ApiError> {
        let mut order = placeholder_order(0, statut);
        order.id = id.to_string();
        Ok(order)
    }

    async fn remove_order(&self, _id: &str) -> Result<(), ApiError> {
        Ok(())
    }
}

pub fn placeholder_order(i: usize, statut: OrderStatus) -> Order {
    use crate::domain::{Customer, OrderLine};
    let now = chrono::Utc::now();
    Order {
        id: format!("commande_{}_{}", statut.slug(), i),
        customer: Customer {
            client_nom: "Client".into(),
            client_email: None,
            client_telephone: "0600000000".into(),
            adresse: "1 rue".into(),
            ville: "Rabat".into(),
        },
        lignes: vec![OrderLine {
            produit_id: "p1".into(),
            nom: "Produit".into(),
            prix: 100.0,
            quantite: 1,
            couleur: None,
            taille: None,
        }],
        total: 100.0,
        statut,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Product;

    #[tokio::test]
    async fn test_mock_client() {
        let (client, mut receiver) = create_mock_client::<Product>(10);

        let get_task = tokio::spawn(async move { client.get("p1".to_string()).await });

        let (id, responder) = expect_get(&mut receiver).await.expect("Expected Get request");
        assert_eq!(id, "p1");
        responder
            .send(Ok(Some(Product::new("p1", "Babouche", 250.0, Some(4)))))
            .unwrap();

        let result = get_task.await.unwrap().unwrap();
        assert_eq!(result.map(|p| p.nom), Some("Babouche".to_string()));
    }
}
