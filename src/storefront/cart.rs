use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::storage::{LocalStorage, StorageError};
use crate::domain::{CartItem, CartKey};

const CART_KEY: &str = "panier";

#[derive(Debug, Error)]
pub enum CartError {
    #[error("Quantité invalide: {0}")]
    InvalidQuantity(u32),
    #[error("Stock insuffisant pour {produit}: demandé {requested}, disponible {available}")]
    InsufficientStock {
        produit: String,
        requested: u32,
        available: u32,
    },
    #[error("Article absent du panier: {0}")]
    LineNotFound(String),
    /// Writing before the saved cart is restored would overwrite it.
    #[error("Panier non chargé")]
    NotLoaded,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The visitor's cart, persisted locally.
///
/// The store never talks to the network: stock bounds come from the snapshot
/// the caller passes in with each item.
#[derive(Debug)]
pub struct CartStore {
    storage: LocalStorage,
    items: Vec<CartItem>,
    loaded: bool,
}

impl CartStore {
    pub fn new(storage: LocalStorage) -> Self {
        Self {
            storage,
            items: Vec::new(),
            loaded: false,
        }
    }

    /// Restores persisted lines. An unreadable payload is discarded and the
    /// cart starts empty.
    #[instrument(skip(self))]
    pub async fn load(&mut self) -> Result<(), CartError> {
        self.items = match self.storage.get::<Vec<CartItem>>(CART_KEY).await {
            Ok(items) => items.unwrap_or_default(),
            Err(e @ StorageError::Corrupt { .. }) => {
                warn!(error = %e, "Discarding unreadable cart");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };
        self.loaded = true;
        info!(lines = self.items.len(), "Cart restored");
        Ok(())
    }

    /// False until persisted state has been restored; an unloaded cart must
    /// not be treated as empty.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn lines(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item_count(&self) -> u32 {
        self.items.iter().fold(0u32, |n, i| n.saturating_add(i.quantite))
    }

    pub fn total(&self) -> f64 {
        self.items.iter().map(CartItem::subtotal).sum()
    }

    pub fn get(&self, key: &CartKey) -> Option<&CartItem> {
        self.items.iter().find(|i| &i.key() == key)
    }

    /// Distinct product ids in the cart, in line order.
    pub fn product_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for item in &self.items {
            if !ids.contains(&item.produit_id) {
                ids.push(item.produit_id.clone());
            }
        }
        ids
    }

    /// Adds an item, merging with an existing line of the same product, color
    /// and size. Returns the line's new quantity.
    #[instrument(skip(self, item), fields(product_id = %item.produit_id, quantite = item.quantite))]
    pub async fn add(&mut self, item: CartItem) -> Result<u32, CartError> {
        self.ensure_loaded()?;
        if item.quantite == 0 {
            return Err(CartError::InvalidQuantity(0));
        }
        let key = item.key();
        let existing = self.get(&key).map(|i| i.quantite).unwrap_or(0);
        let requested = existing
            .checked_add(item.quantite)
            .ok_or(CartError::InvalidQuantity(item.quantite))?;

        if let Some(available) = item.stock_snapshot {
            if requested > available {
                warn!(requested, available, "Add to cart refused");
                return Err(CartError::InsufficientStock {
                    produit: item.nom,
                    requested,
                    available,
                });
            }
        }

        match self.items.iter_mut().find(|i| i.key() == key) {
            Some(line) => {
                line.quantite = requested;
                line.prix = item.prix;
                line.stock_snapshot = item.stock_snapshot;
                line.snapshot_at = item.snapshot_at;
            }
            None => self.items.push(item),
        }
        debug!(quantite = requested, "Cart line updated");
        self.persist().await?;
        Ok(requested)
    }

    /// Sets a line's quantity; zero removes the line.
    #[instrument(skip(self))]
    pub async fn set_quantity(&mut self, key: &CartKey, quantite: u32) -> Result<(), CartError> {
        self.ensure_loaded()?;
        if quantite == 0 {
            return self.remove(key).await;
        }
        let line = self
            .items
            .iter_mut()
            .find(|i| &i.key() == key)
            .ok_or_else(|| CartError::LineNotFound(key.produit_id.clone()))?;
        if let Some(available) = line.stock_snapshot {
            if quantite > available {
                return Err(CartError::InsufficientStock {
                    produit: line.nom.clone(),
                    requested: quantite,
                    available,
                });
            }
        }
        line.quantite = quantite;
        self.persist().await
    }

    #[instrument(skip(self))]
    pub async fn remove(&mut self, key: &CartKey) -> Result<(), CartError> {
        self.ensure_loaded()?;
        let before = self.items.len();
        self.items.retain(|i| &i.key() != key);
        if self.items.len() == before {
            return Err(CartError::LineNotFound(key.produit_id.clone()));
        }
        self.persist().await
    }

    #[instrument(skip(self))]
    pub async fn clear(&mut self) -> Result<(), CartError> {
        self.ensure_loaded()?;
        self.items.clear();
        self.storage.remove(CART_KEY).await?;
        info!("Cart cleared");
        Ok(())
    }

    /// Records a fresher advisory stock value for a line. Returns false if
    /// the line is gone.
    pub async fn refresh_snapshot(&mut self, key: &CartKey, stock: Option<u32>) -> Result<bool, CartError> {
        self.ensure_loaded()?;
        let Some(line) = self.items.iter_mut().find(|i| &i.key() == key) else {
            return Ok(false);
        };
        line.stock_snapshot = stock;
        line.snapshot_at = Utc::now();
        self.persist().await?;
        Ok(true)
    }

    /// Lines whose stock snapshot is older than `max_age`.
    pub fn stale_lines(&self, now: DateTime<Utc>, max_age: Duration) -> Vec<CartKey> {
        self.items
            .iter()
            .filter(|i| i.is_snapshot_stale(now, max_age))
            .map(CartItem::key)
            .collect()
    }

    fn ensure_loaded(&self) -> Result<(), CartError> {
        if self.loaded {
            Ok(())
        } else {
            Err(CartError::NotLoaded)
        }
    }

    async fn persist(&self) -> Result<(), CartError> {
        Ok(self.storage.set(CART_KEY, &self.items).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &tempfile::TempDir) -> CartStore {
        CartStore::new(LocalStorage::new(dir.path()))
    }

    #[tokio::test]
    async fn add_rejects_quantity_above_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut cart = store(&dir);
        cart.load().await.unwrap();

        let err = cart
            .add(CartItem::new("p1", "Ceinture", 120.0, 5, Some(3)))
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::InsufficientStock { requested: 5, available: 3, .. }));
        assert!(err.to_string().starts_with("Stock insuffisant"));
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn add_merges_same_variant_and_caps_at_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut cart = store(&dir);
        cart.load().await.unwrap();

        let item = || CartItem::new("p1", "Sac", 450.0, 1, Some(2)).with_couleur("Noir");
        assert_eq!(cart.add(item()).await.unwrap(), 1);
        assert_eq!(cart.add(item()).await.unwrap(), 2);
        assert!(cart.add(item()).await.is_err());
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.item_count(), 2);

        // Another color is a separate line.
        cart.add(CartItem::new("p1", "Sac", 450.0, 1, Some(5)).with_couleur("Camel"))
            .await
            .unwrap();
        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.product_ids(), vec!["p1".to_string()]);
        assert_eq!(cart.total(), 1350.0);
    }

    #[tokio::test]
    async fn undefined_stock_does_not_cap() {
        let dir = tempfile::tempdir().unwrap();
        let mut cart = store(&dir);
        cart.load().await.unwrap();
        assert_eq!(cart.add(CartItem::new("p2", "Carte", 200.0, 40, None)).await.unwrap(), 40);
    }

    #[tokio::test]
    async fn zero_quantity_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let mut cart = store(&dir);
        cart.load().await.unwrap();
        assert!(matches!(
            cart.add(CartItem::new("p1", "Sac", 1.0, 0, None)).await,
            Err(CartError::InvalidQuantity(0))
        ));
    }

    #[tokio::test]
    async fn state_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut cart = store(&dir);
            cart.load().await.unwrap();
            cart.add(CartItem::new("p1", "Sac", 450.0, 2, Some(4)).with_couleur("Noir").with_taille("M"))
                .await
                .unwrap();
        }

        let mut restored = store(&dir);
        assert!(!restored.is_loaded());
        restored.load().await.unwrap();
        assert!(restored.is_loaded());
        let key = CartKey::new("p1", Some("Noir"), Some("M"));
        assert_eq!(restored.get(&key).map(|i| i.quantite), Some(2));

        restored.set_quantity(&key, 3).await.unwrap();
        assert!(restored.set_quantity(&key, 9).await.is_err());
        restored.set_quantity(&key, 0).await.unwrap();
        assert!(restored.is_empty());
    }

    #[tokio::test]
    async fn writes_before_load_leave_saved_cart_intact() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut cart = store(&dir);
            cart.load().await.unwrap();
            cart.add(CartItem::new("p1", "Sac", 450.0, 1, None)).await.unwrap();
            cart.add(CartItem::new("p2", "Ceinture", 120.0, 1, None)).await.unwrap();
        }

        let mut cart = store(&dir);
        let key = CartKey::new("p1", None, None);
        assert!(matches!(
            cart.add(CartItem::new("p3", "Babouche", 250.0, 1, None)).await,
            Err(CartError::NotLoaded)
        ));
        assert!(matches!(cart.set_quantity(&key, 2).await, Err(CartError::NotLoaded)));
        assert!(matches!(cart.remove(&key).await, Err(CartError::NotLoaded)));
        assert!(matches!(cart.refresh_snapshot(&key, Some(1)).await, Err(CartError::NotLoaded)));
        assert!(matches!(cart.clear().await, Err(CartError::NotLoaded)));

        cart.load().await.unwrap();
        assert_eq!(cart.product_ids(), vec!["p1".to_string(), "p2".to_string()]);
    }

    #[tokio::test]
    async fn merged_quantity_overflow_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let mut cart = store(&dir);
        cart.load().await.unwrap();
        cart.add(CartItem::new("p2", "Carte", 200.0, u32::MAX, None)).await.unwrap();

        assert!(matches!(
            cart.add(CartItem::new("p2", "Carte", 200.0, 1, None)).await,
            Err(CartError::InvalidQuantity(1))
        ));
        assert_eq!(cart.item_count(), u32::MAX);
    }

    #[tokio::test]
    async fn corrupt_cart_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("panier.json"), b"[{").unwrap();
        let mut cart = store(&dir);
        cart.load().await.unwrap();
        assert!(cart.is_loaded());
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn snapshots_refresh_and_go_stale() {
        let dir = tempfile::tempdir().unwrap();
        let mut cart = store(&dir);
        cart.load().await.unwrap();
        let mut item = CartItem::new("p1", "Sac", 450.0, 1, Some(4));
        item.snapshot_at = Utc::now() - Duration::minutes(30);
        cart.add(item).await.unwrap();

        let key = CartKey::new("p1", None, None);
        assert_eq!(cart.stale_lines(Utc::now(), Duration::minutes(15)), vec![key.clone()]);

        assert!(cart.refresh_snapshot(&key, Some(1)).await.unwrap());
        assert!(cart.stale_lines(Utc::now(), Duration::minutes(15)).is_empty());
        assert_eq!(cart.get(&key).and_then(|i| i.stock_snapshot), Some(1));

        cart.clear().await.unwrap();
        assert!(!cart.refresh_snapshot(&key, Some(1)).await.unwrap());
    }
}
