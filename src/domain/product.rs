use serde::{Deserialize, Serialize};

/// Stock held by one size of a color variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TailleStock {
    pub taille: String,
    #[serde(default)]
    pub stock: u32,
}

/// A named color option on a product, carrying its own stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Couleur {
    pub nom: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub stock: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taille: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tailles: Vec<TailleStock>,
}

impl Couleur {
    pub fn new(nom: impl Into<String>, code: impl Into<String>, stock: u32) -> Self {
        Self {
            nom: nom.into(),
            code: code.into(),
            stock,
            taille: None,
            tailles: Vec::new(),
        }
    }

    pub fn with_tailles(mut self, tailles: Vec<TailleStock>) -> Self {
        self.tailles = tailles;
        self
    }

    fn size_stock_mut(&mut self, taille: &str) -> Option<&mut u32> {
        self.tailles
            .iter_mut()
            .find(|t| t.taille == taille)
            .map(|t| &mut t.stock)
    }
}

/// Represents a product row of the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub nom: String,
    pub prix: f64,
    #[serde(default)]
    pub has_colors: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<u32>,
    #[serde(default)]
    pub couleurs: Vec<Couleur>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categorie: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Payload for creating a new product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductCreate {
    pub nom: String,
    pub prix: f64,
    pub stock: Option<u32>,
    pub couleurs: Vec<Couleur>,
    pub categorie: Option<String>,
    pub image_url: Option<String>,
}

/// Partial update applied by the admin product editor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductPatch {
    pub nom: Option<String>,
    pub prix: Option<f64>,
    pub stock: Option<u32>,
    pub couleurs: Option<Vec<Couleur>>,
}

/// How much of a product (or variant) can still be ordered.
///
/// `Unlimited` comes from an undefined stock field and never reads as
/// out-of-stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Unlimited,
    Limited(u32),
}

impl Availability {
    pub fn covers(&self, quantite: u32) -> bool {
        match self {
            Availability::Unlimited => true,
            Availability::Limited(n) => *n >= quantite,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Availability::Limited(0))
    }

    /// Stock value to cache on a cart line; `None` means unlimited.
    pub fn as_snapshot(&self) -> Option<u32> {
        match self {
            Availability::Unlimited => None,
            Availability::Limited(n) => Some(*n),
        }
    }
}

impl Product {
    pub fn new(id: impl Into<String>, nom: impl Into<String>, prix: f64, stock: Option<u32>) -> Self {
        Self {
            id: id.into(),
            nom: nom.into(),
            prix,
            has_colors: false,
            stock,
            couleurs: Vec::new(),
            categorie: None,
            image_url: None,
        }
    }

    /// Builds a color-variant product. The flat stock is left undefined.
    pub fn with_colors(
        id: impl Into<String>,
        nom: impl Into<String>,
        prix: f64,
        couleurs: Vec<Couleur>,
    ) -> Self {
        Self {
            has_colors: true,
            couleurs,
            ..Self::new(id, nom, prix, None)
        }
    }

    pub fn couleur(&self, nom: &str) -> Option<&Couleur> {
        self.couleurs.iter().find(|c| c.nom == nom)
    }

    /// Resolves available quantity for a selection.
    ///
    /// With `has_colors` the flat `stock` field is ignored: the selected color
    /// entry (and size, when the entry tracks sizes) is authoritative, a missing
    /// entry resolves to zero, and no selection sums every entry.
    pub fn availability(&self, couleur: Option<&str>, taille: Option<&str>) -> Availability {
        if !self.has_colors {
            return match self.stock {
                Some(n) => Availability::Limited(n),
                None => Availability::Unlimited,
            };
        }

        let Some(nom) = couleur else {
            return Availability::Limited(self.couleurs.iter().map(|c| c.stock).sum());
        };

        match self.couleur(nom) {
            None => Availability::Limited(0),
            Some(entry) => match taille {
                Some(t) if !entry.tailles.is_empty() => Availability::Limited(
                    entry
                        .tailles
                        .iter()
                        .find(|s| s.taille == t)
                        .map(|s| s.stock)
                        .unwrap_or(0),
                ),
                _ => Availability::Limited(entry.stock),
            },
        }
    }

    /// Decrements stock for a selection. Fails with the currently available
    /// quantity when the selection cannot cover `quantite`.
    ///
    /// The returned [`StockDraw`] records every counter that was touched, so
    /// [`Product::restore_stock`] puts back exactly what was taken.
    pub fn take_stock(
        &mut self,
        couleur: Option<&str>,
        taille: Option<&str>,
        quantite: u32,
    ) -> Result<StockDraw, u32> {
        let available = self.availability(couleur, taille);
        if !available.covers(quantite) {
            return Err(available.as_snapshot().unwrap_or(0));
        }
        let mut draw = StockDraw::default();
        if !self.has_colors {
            if let Some(stock) = self.stock.as_mut() {
                *stock -= quantite;
                draw.flat = quantite;
            }
            return Ok(draw);
        }

        match couleur {
            Some(nom) => {
                if let Some(entry) = self.couleurs.iter_mut().find(|c| c.nom == nom) {
                    let mut part = ColorDraw::new(&entry.nom);
                    if let Some(t) = taille.filter(|_| !entry.tailles.is_empty()) {
                        if let Some(stock) = entry.size_stock_mut(t) {
                            *stock -= quantite;
                            part.taille = Some(t.to_string());
                            part.taille_stock = quantite;
                        }
                    }
                    part.stock = quantite.min(entry.stock);
                    entry.stock -= part.stock;
                    draw.couleurs.push(part);
                }
            }
            None => {
                // Spread the decrement across entries in catalog order.
                let mut remaining = quantite;
                for entry in self.couleurs.iter_mut() {
                    let taken = remaining.min(entry.stock);
                    if taken > 0 {
                        entry.stock -= taken;
                        remaining -= taken;
                        draw.couleurs.push(ColorDraw {
                            stock: taken,
                            ..ColorDraw::new(&entry.nom)
                        });
                    }
                    if remaining == 0 {
                        break;
                    }
                }
            }
        }
        Ok(draw)
    }

    /// Gives back stock taken by [`Product::take_stock`].
    pub fn restore_stock(&mut self, draw: &StockDraw) {
        if let Some(stock) = self.stock.as_mut() {
            *stock += draw.flat;
        }
        for part in &draw.couleurs {
            let Some(entry) = self.couleurs.iter_mut().find(|c| c.nom == part.couleur) else {
                continue;
            };
            entry.stock += part.stock;
            if let Some(t) = part.taille.as_deref() {
                if let Some(stock) = entry.size_stock_mut(t) {
                    *stock += part.taille_stock;
                }
            }
        }
    }
}

/// Counters decremented by one reservation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockDraw {
    pub flat: u32,
    pub couleurs: Vec<ColorDraw>,
}

impl StockDraw {
    pub fn is_empty(&self) -> bool {
        self.flat == 0 && self.couleurs.is_empty()
    }
}

/// Part of a [`StockDraw`] taken from one color entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorDraw {
    pub couleur: String,
    pub stock: u32,
    pub taille: Option<String>,
    pub taille_stock: u32,
}

impl ColorDraw {
    fn new(couleur: &str) -> Self {
        Self {
            couleur: couleur.to_string(),
            stock: 0,
            taille: None,
            taille_stock: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sac() -> Product {
        Product::with_colors(
            "p1",
            "Sac cuir",
            450.0,
            vec![
                Couleur::new("Noir", "#000000", 2),
                Couleur::new("Camel", "#c19a6b", 5).with_tailles(vec![
                    TailleStock { taille: "M".into(), stock: 3 },
                    TailleStock { taille: "L".into(), stock: 2 },
                ]),
            ],
        )
    }

    #[test]
    fn flat_stock_is_used_without_colors() {
        let p = Product::new("p1", "Ceinture", 120.0, Some(3));
        assert_eq!(p.availability(None, None), Availability::Limited(3));
        assert_eq!(p.availability(Some("Noir"), None), Availability::Limited(3));
    }

    #[test]
    fn undefined_stock_is_available() {
        let p = Product::new("p1", "Ceinture", 120.0, None);
        assert_eq!(p.availability(None, None), Availability::Unlimited);
        assert!(p.availability(None, None).covers(1_000));
    }

    #[test]
    fn color_entry_wins_over_flat_stock() {
        let mut p = sac();
        p.stock = Some(99);
        assert_eq!(p.availability(Some("Noir"), None), Availability::Limited(2));
    }

    #[test]
    fn missing_color_resolves_to_zero() {
        let p = sac();
        let a = p.availability(Some("Rouge"), None);
        assert_eq!(a, Availability::Limited(0));
        assert!(a.is_exhausted());
    }

    #[test]
    fn sized_stock_is_selected_by_size() {
        let p = sac();
        assert_eq!(p.availability(Some("Camel"), Some("L")), Availability::Limited(2));
        assert_eq!(p.availability(Some("Camel"), Some("XL")), Availability::Limited(0));
        assert_eq!(p.availability(Some("Noir"), Some("M")), Availability::Limited(2));
    }

    #[test]
    fn no_selection_sums_colors() {
        assert_eq!(sac().availability(None, None), Availability::Limited(7));
    }

    #[test]
    fn take_and_restore_stock() {
        let mut p = sac();
        let draw = p.take_stock(Some("Camel"), Some("M"), 2).unwrap();
        assert_eq!(p.availability(Some("Camel"), Some("M")), Availability::Limited(1));
        assert_eq!(p.couleur("Camel").unwrap().stock, 3);

        assert_eq!(p.take_stock(Some("Noir"), None, 3), Err(2));

        p.restore_stock(&draw);
        assert_eq!(p, sac());
    }

    #[test]
    fn colorless_reservation_is_restored_where_it_was_taken() {
        let mut p = sac();
        let draw = p.take_stock(None, None, 4).unwrap();
        assert_eq!(p.couleur("Noir").unwrap().stock, 0);
        assert_eq!(p.couleur("Camel").unwrap().stock, 3);
        assert_eq!(draw.couleurs.len(), 2);

        p.restore_stock(&draw);
        assert_eq!(p.couleur("Noir").unwrap().stock, 2);
        assert_eq!(p.couleur("Camel").unwrap().stock, 5);
    }

    #[test]
    fn sized_color_with_lower_color_stock_restores_exactly() {
        let mut p = sac();
        p.couleurs[1].stock = 1;
        let draw = p.take_stock(Some("Camel"), Some("M"), 3).unwrap();
        assert_eq!(p.couleur("Camel").unwrap().stock, 0);

        p.restore_stock(&draw);
        assert_eq!(p.couleur("Camel").unwrap().stock, 1);
        assert_eq!(p.availability(Some("Camel"), Some("M")), Availability::Limited(3));
    }

    #[test]
    fn unlimited_stock_is_not_decremented() {
        let mut p = Product::new("p1", "Carte cadeau", 200.0, None);
        let draw = p.take_stock(None, None, 50).unwrap();
        assert_eq!(p.stock, None);
        assert!(draw.is_empty());
    }

    #[test]
    fn deserializes_hosted_row() {
        let row = serde_json::json!({
            "id": "p9",
            "nom": "Mocassin",
            "prix": 690.0,
            "has_colors": true,
            "couleurs": [{ "nom": "Noir", "code": "#000", "stock": 4 }]
        });
        let p: Product = serde_json::from_value(row).unwrap();
        assert_eq!(p.stock, None);
        assert_eq!(p.availability(Some("Noir"), None), Availability::Limited(4));
    }
}
