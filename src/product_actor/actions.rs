use crate::domain::{Availability, StockDraw};

/// Selection a stock action applies to.
#[derive(Debug, Clone, PartialEq)]
pub struct StockSelection {
    pub couleur: Option<String>,
    pub taille: Option<String>,
    pub quantite: u32,
}

impl StockSelection {
    pub fn new(couleur: Option<&str>, taille: Option<&str>, quantite: u32) -> Self {
        Self {
            couleur: couleur.map(str::to_string),
            taille: taille.map(str::to_string),
            quantite,
        }
    }
}

/// Custom actions for Product entities.
///
/// These run inside the product actor, so a check-and-decrement is atomic
/// with respect to every other request on the catalog.
#[derive(Debug, Clone)]
pub enum ProductAction {
    /// Resolves availability for a selection without modifying stock.
    CheckStock { couleur: Option<String>, taille: Option<String> },
    /// Decrements stock if the selection can cover the quantity.
    Reserve(StockSelection),
    /// Gives back the exact counters a previous `Reserve` decremented.
    Release(StockDraw),
}

/// Results from ProductActions.
#[derive(Debug, Clone, PartialEq)]
pub enum ProductActionResult {
    StockLevel(Availability),
    Reserved(StockDraw),
    /// The reservation was refused; nothing was decremented.
    Shortage { available: u32 },
    Released,
}
