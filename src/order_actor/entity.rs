use chrono::Utc;

use crate::actor_framework::Entity;
use crate::domain::{Order, OrderCreate, OrderPatch, OrderStatus};

impl Entity for Order {
    type Id = String;
    type CreateParams = OrderCreate;
    type Patch = OrderPatch;
    type Action = ();
    type ActionResult = ();

    const TABLE: &'static str = "commandes";

    fn id(&self) -> &String {
        &self.id
    }

    /// Creates a new Order from creation parameters.
    ///
    /// # Notes
    /// The order starts `En attente` and its total is recomputed from the lines.
    fn from_create_params(id: String, params: OrderCreate) -> Result<Self, String> {
        if params.lignes.is_empty() {
            return Err("commande sans article".to_string());
        }
        let now = Utc::now();
        let total = params.total();
        Ok(Self {
            id,
            customer: params.customer,
            lignes: params.lignes,
            total,
            statut: OrderStatus::EnAttente,
            created_at: now,
            updated_at: now,
        })
    }

    fn on_update(&mut self, patch: OrderPatch) -> Result<(), String> {
        if self.statut != patch.statut {
            self.statut = patch.statut;
            self.updated_at = Utc::now();
        }
        Ok(())
    }

    fn handle_action(&mut self, _action: ()) -> Result<(), String> {
        Ok(())
    }
}
