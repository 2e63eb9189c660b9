use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The fixed set of order statuses, serialized with the store's strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OrderStatus {
    #[serde(rename = "En attente")]
    EnAttente,
    #[serde(rename = "Expédiée")]
    Expediee,
    #[serde(rename = "Livrée")]
    Livree,
    #[serde(rename = "Annulée")]
    Annulee,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::EnAttente,
        OrderStatus::Expediee,
        OrderStatus::Livree,
        OrderStatus::Annulee,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::EnAttente => "En attente",
            OrderStatus::Expediee => "Expédiée",
            OrderStatus::Livree => "Livrée",
            OrderStatus::Annulee => "Annulée",
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            OrderStatus::EnAttente => "en-attente",
            OrderStatus::Expediee => "expediee",
            OrderStatus::Livree => "livree",
            OrderStatus::Annulee => "annulee",
        }
    }

    /// Parses a status column value. Unknown strings yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a purchased product at order time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub produit_id: String,
    pub nom: String,
    pub prix: f64,
    pub quantite: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub couleur: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taille: Option<String>,
}

impl OrderLine {
    pub fn subtotal(&self) -> f64 {
        self.prix * f64::from(self.quantite)
    }
}

/// Customer fields captured at checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub client_nom: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_email: Option<String>,
    pub client_telephone: String,
    pub adresse: String,
    pub ville: String,
}

impl Customer {
    /// Checks required fields. Returns the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        let required = [
            ("client_nom", &self.client_nom),
            ("client_telephone", &self.client_telephone),
            ("adresse", &self.adresse),
            ("ville", &self.ville),
        ];
        if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(format!("champ requis manquant: {}", field));
        }
        if let Some(email) = &self.client_email {
            if !email.contains('@') {
                return Err(format!("email invalide: {}", email));
            }
        }
        Ok(())
    }
}

/// Represents a customer order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    #[serde(flatten)]
    pub customer: Customer,
    pub lignes: Vec<OrderLine>,
    pub total: f64,
    pub statut: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload sent to the order-submission endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreate {
    #[serde(flatten)]
    pub customer: Customer,
    pub lignes: Vec<OrderLine>,
}

impl OrderCreate {
    pub fn total(&self) -> f64 {
        self.lignes.iter().map(OrderLine::subtotal).sum()
    }
}

/// Admin-side mutation of an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPatch {
    pub statut: OrderStatus,
}
