use super::actions::{ProductAction, ProductActionResult};
use crate::actor_framework::Entity;
use crate::domain::{Product, ProductCreate, ProductPatch};

impl Entity for Product {
    type Id = String;
    type CreateParams = ProductCreate;
    type Patch = ProductPatch;
    type Action = ProductAction;
    type ActionResult = ProductActionResult;

    const TABLE: &'static str = "produits";

    fn id(&self) -> &String {
        &self.id
    }

    /// Creates a new Product from creation parameters.
    ///
    /// `has_colors` is derived from the presence of color entries.
    fn from_create_params(id: String, params: ProductCreate) -> Result<Self, String> {
        if params.nom.trim().is_empty() {
            return Err("nom du produit requis".to_string());
        }
        if !params.prix.is_finite() || params.prix < 0.0 {
            return Err(format!("prix invalide: {}", params.prix));
        }
        Ok(Self {
            id,
            nom: params.nom,
            prix: params.prix,
            has_colors: !params.couleurs.is_empty(),
            stock: params.stock,
            couleurs: params.couleurs,
            categorie: params.categorie,
            image_url: params.image_url,
        })
    }

    fn on_update(&mut self, patch: ProductPatch) -> Result<(), String> {
        if let Some(prix) = patch.prix {
            if !prix.is_finite() || prix < 0.0 {
                return Err(format!("prix invalide: {}", prix));
            }
            self.prix = prix;
        }
        if let Some(nom) = patch.nom {
            self.nom = nom;
        }
        if let Some(stock) = patch.stock {
            self.stock = Some(stock);
        }
        if let Some(couleurs) = patch.couleurs {
            self.has_colors = !couleurs.is_empty();
            self.couleurs = couleurs;
        }
        Ok(())
    }

    /// Handles product-specific actions.
    ///
    /// A shortage is reported as a result rather than an error so the caller
    /// gets the available quantity back.
    fn handle_action(&mut self, action: ProductAction) -> Result<ProductActionResult, String> {
        match action {
            ProductAction::CheckStock { couleur, taille } => Ok(ProductActionResult::StockLevel(
                self.availability(couleur.as_deref(), taille.as_deref()),
            )),
            ProductAction::Reserve(sel) => {
                match self.take_stock(sel.couleur.as_deref(), sel.taille.as_deref(), sel.quantite) {
                    Ok(draw) => Ok(ProductActionResult::Reserved(draw)),
                    Err(available) => Ok(ProductActionResult::Shortage { available }),
                }
            }
            ProductAction::Release(draw) => {
                self.restore_stock(&draw);
                Ok(ProductActionResult::Released)
            }
        }
    }
}
