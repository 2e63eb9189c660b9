use thiserror::Error;
use tracing::{instrument, warn};

use super::storage::{LocalStorage, StorageError};
use crate::domain::WishlistItem;

const WISHLIST_KEY: &str = "favoris";

#[derive(Debug, Error)]
pub enum WishlistError {
    #[error("Favoris non chargés")]
    NotLoaded,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Saved products, keyed by product id and persisted locally.
#[derive(Debug)]
pub struct WishlistStore {
    storage: LocalStorage,
    items: Vec<WishlistItem>,
    loaded: bool,
}

impl WishlistStore {
    pub fn new(storage: LocalStorage) -> Self {
        Self {
            storage,
            items: Vec::new(),
            loaded: false,
        }
    }

    #[instrument(skip(self))]
    pub async fn load(&mut self) -> Result<(), StorageError> {
        self.items = match self.storage.get::<Vec<WishlistItem>>(WISHLIST_KEY).await {
            Ok(items) => items.unwrap_or_default(),
            Err(e @ StorageError::Corrupt { .. }) => {
                warn!(error = %e, "Discarding unreadable wishlist");
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        self.loaded = true;
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn items(&self) -> &[WishlistItem] {
        &self.items
    }

    pub fn contains(&self, produit_id: &str) -> bool {
        self.items.iter().any(|i| i.produit_id == produit_id)
    }

    /// Adds the item unless already present. Returns true if it was added.
    pub async fn add(&mut self, item: WishlistItem) -> Result<bool, WishlistError> {
        self.ensure_loaded()?;
        if self.contains(&item.produit_id) {
            return Ok(false);
        }
        self.items.push(item);
        self.persist().await?;
        Ok(true)
    }

    /// Returns true if something was removed.
    pub async fn remove(&mut self, produit_id: &str) -> Result<bool, WishlistError> {
        self.ensure_loaded()?;
        let before = self.items.len();
        self.items.retain(|i| i.produit_id != produit_id);
        if self.items.len() == before {
            return Ok(false);
        }
        self.persist().await?;
        Ok(true)
    }

    /// Adds or removes; returns whether the product is now in the wishlist.
    pub async fn toggle(&mut self, item: WishlistItem) -> Result<bool, WishlistError> {
        if self.contains(&item.produit_id) {
            self.remove(&item.produit_id).await?;
            Ok(false)
        } else {
            self.add(item).await
        }
    }

    pub async fn clear(&mut self) -> Result<(), WishlistError> {
        self.ensure_loaded()?;
        self.items.clear();
        Ok(self.storage.remove(WISHLIST_KEY).await?)
    }

    fn ensure_loaded(&self) -> Result<(), WishlistError> {
        if self.loaded {
            Ok(())
        } else {
            Err(WishlistError::NotLoaded)
        }
    }

    async fn persist(&self) -> Result<(), WishlistError> {
        Ok(self.storage.set(WISHLIST_KEY, &self.items).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn toggle_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut wishlist = WishlistStore::new(LocalStorage::new(dir.path()));
        wishlist.load().await.unwrap();

        assert!(wishlist.toggle(WishlistItem::new("p1", "Sac", 450.0)).await.unwrap());
        assert!(!wishlist.add(WishlistItem::new("p1", "Sac", 450.0)).await.unwrap());
        wishlist.add(WishlistItem::new("p2", "Ceinture", 120.0)).await.unwrap();

        let mut restored = WishlistStore::new(LocalStorage::new(dir.path()));
        restored.load().await.unwrap();
        assert_eq!(restored.items().len(), 2);

        assert!(!restored.toggle(WishlistItem::new("p1", "Sac", 450.0)).await.unwrap());
        assert!(!restored.contains("p1"));
        assert!(!restored.remove("p1").await.unwrap());

        restored.clear().await.unwrap();
        assert!(restored.items().is_empty());
    }

    #[tokio::test]
    async fn toggle_before_load_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut saved = WishlistStore::new(LocalStorage::new(dir.path()));
        saved.load().await.unwrap();
        saved.add(WishlistItem::new("p1", "Sac", 450.0)).await.unwrap();

        let mut wishlist = WishlistStore::new(LocalStorage::new(dir.path()));
        assert!(matches!(
            wishlist.toggle(WishlistItem::new("p2", "Ceinture", 120.0)).await,
            Err(WishlistError::NotLoaded)
        ));
        wishlist.load().await.unwrap();
        assert!(wishlist.contains("p1"));
        assert!(!wishlist.contains("p2"));
    }
}
