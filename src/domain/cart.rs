use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::order::OrderLine;

/// Identity of a cart line: same product, color and size merge together.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CartKey {
    pub produit_id: String,
    pub couleur: Option<String>,
    pub taille: Option<String>,
}

impl CartKey {
    pub fn new(produit_id: impl Into<String>, couleur: Option<&str>, taille: Option<&str>) -> Self {
        Self {
            produit_id: produit_id.into(),
            couleur: couleur.map(str::to_string),
            taille: taille.map(str::to_string),
        }
    }
}

/// A selected product held in the client-side cart.
///
/// `stock_snapshot` is an advisory cache of the stock seen at selection time
/// (`None` when the product's stock is undefined). It bounds `add` but is
/// never authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub produit_id: String,
    pub nom: String,
    pub prix: f64,
    pub quantite: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub couleur: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taille: Option<String>,
    #[serde(default)]
    pub stock_snapshot: Option<u32>,
    pub snapshot_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl CartItem {
    pub fn new(
        produit_id: impl Into<String>,
        nom: impl Into<String>,
        prix: f64,
        quantite: u32,
        stock_snapshot: Option<u32>,
    ) -> Self {
        Self {
            produit_id: produit_id.into(),
            nom: nom.into(),
            prix,
            quantite,
            couleur: None,
            taille: None,
            stock_snapshot,
            snapshot_at: Utc::now(),
            image_url: None,
        }
    }

    pub fn with_couleur(mut self, couleur: impl Into<String>) -> Self {
        self.couleur = Some(couleur.into());
        self
    }

    pub fn with_taille(mut self, taille: impl Into<String>) -> Self {
        self.taille = Some(taille.into());
        self
    }

    pub fn key(&self) -> CartKey {
        CartKey::new(self.produit_id.clone(), self.couleur.as_deref(), self.taille.as_deref())
    }

    pub fn subtotal(&self) -> f64 {
        self.prix * f64::from(self.quantite)
    }

    pub fn is_snapshot_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now - self.snapshot_at > max_age
    }

    pub fn to_order_line(&self) -> OrderLine {
        OrderLine {
            produit_id: self.produit_id.clone(),
            nom: self.nom.clone(),
            prix: self.prix,
            quantite: self.quantite,
            couleur: self.couleur.clone(),
            taille: self.taille.clone(),
        }
    }
}

/// A product saved for later; keyed by product id only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WishlistItem {
    pub produit_id: String,
    pub nom: String,
    pub prix: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl WishlistItem {
    pub fn new(produit_id: impl Into<String>, nom: impl Into<String>, prix: f64) -> Self {
        Self {
            produit_id: produit_id.into(),
            nom: nom.into(),
            prix,
            image_url: None,
        }
    }
}
