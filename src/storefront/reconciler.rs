//! Advisory stock checks for cart lines.
//!
//! Nothing here is authoritative: the order-submission endpoint re-validates
//! and decrements stock. These checks only decide which warnings the
//! visitor sees.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::api::ProductSource;
use crate::domain::{Availability, CartItem, CartKey, Product};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Shown to the visitor; checkout may proceed.
    Warning,
    /// The line cannot be ordered as is.
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StockIssue {
    OutOfStock,
    /// The selected color no longer exists on the product.
    ColorUnavailable { couleur: String },
    Insufficient { available: u32, requested: u32 },
    /// The product could not be fetched.
    ProductUnavailable,
}

impl StockIssue {
    pub fn severity(&self) -> Severity {
        match self {
            StockIssue::Insufficient { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// A user-facing stock message about one cart line.
#[derive(Debug, Clone, PartialEq)]
pub struct StockNotice {
    pub key: CartKey,
    pub nom: String,
    pub issue: StockIssue,
}

impl StockNotice {
    pub fn severity(&self) -> Severity {
        self.issue.severity()
    }

    /// Quantity still available, when the notice knows it.
    pub fn available(&self) -> Option<u32> {
        match self.issue {
            StockIssue::OutOfStock | StockIssue::ColorUnavailable { .. } => Some(0),
            StockIssue::Insufficient { available, .. } => Some(available),
            StockIssue::ProductUnavailable => None,
        }
    }

    pub fn message(&self) -> String {
        match &self.issue {
            StockIssue::OutOfStock => format!("{} est en rupture de stock", self.nom),
            StockIssue::ColorUnavailable { couleur } => {
                format!("{}: la couleur {} n'est plus disponible", self.nom, couleur)
            }
            StockIssue::Insufficient { available, requested } => format!(
                "{}: seulement {} disponible(s) pour {} demandé(s)",
                self.nom, available, requested
            ),
            StockIssue::ProductUnavailable => format!("{} n'est plus disponible", self.nom),
        }
    }
}

/// Resolves a line against a product row and classifies it.
pub fn assess_line(product: &Product, line: &CartItem) -> (Availability, Option<StockIssue>) {
    if let Some(couleur) = &line.couleur {
        if product.has_colors && product.couleur(couleur).is_none() {
            return (
                Availability::Limited(0),
                Some(StockIssue::ColorUnavailable { couleur: couleur.clone() }),
            );
        }
    }

    let availability = product.availability(line.couleur.as_deref(), line.taille.as_deref());
    let issue = match availability {
        Availability::Limited(0) => Some(StockIssue::OutOfStock),
        Availability::Limited(available) if available < line.quantite => Some(StockIssue::Insufficient {
            available,
            requested: line.quantite,
        }),
        _ => None,
    };
    (availability, issue)
}

/// Result of validating one line.
#[derive(Debug, Clone, PartialEq)]
pub struct LineReport {
    pub key: CartKey,
    pub nom: String,
    pub requested: u32,
    /// `None` when the product could not be fetched.
    pub availability: Option<Availability>,
    pub issue: Option<StockIssue>,
}

impl LineReport {
    pub fn notice(&self) -> Option<StockNotice> {
        self.issue.clone().map(|issue| StockNotice {
            key: self.key.clone(),
            nom: self.nom.clone(),
            issue,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub lines: Vec<LineReport>,
}

impl ValidationReport {
    pub fn notices(&self) -> Vec<StockNotice> {
        self.lines.iter().filter_map(LineReport::notice).collect()
    }

    pub fn errors(&self) -> Vec<StockNotice> {
        self.notices()
            .into_iter()
            .filter(|n| n.severity() == Severity::Error)
            .collect()
    }

    pub fn warnings(&self) -> Vec<StockNotice> {
        self.notices()
            .into_iter()
            .filter(|n| n.severity() == Severity::Warning)
            .collect()
    }

    /// Warnings never block; errors do.
    pub fn can_submit(&self) -> bool {
        self.errors().is_empty()
    }
}

/// Checks every line against freshly fetched products.
///
/// Products are fetched concurrently, once per distinct id. A failed fetch
/// marks only that product's lines as unavailable.
#[instrument(skip(source, lines), fields(lines = lines.len()))]
pub async fn validate_cart(source: Arc<dyn ProductSource>, lines: &[CartItem]) -> ValidationReport {
    let mut fetches = JoinSet::new();
    let mut ids: Vec<&str> = lines.iter().map(|l| l.produit_id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    for id in ids {
        let source = Arc::clone(&source);
        let id = id.to_string();
        fetches.spawn(async move {
            let result = source.fetch_product(&id).await;
            (id, result)
        });
    }

    let mut products: HashMap<String, Product> = HashMap::new();
    while let Some(joined) = fetches.join_next().await {
        match joined {
            Ok((_, Ok(product))) => {
                products.insert(product.id.clone(), product);
            }
            Ok((id, Err(e))) => warn!(product_id = %id, error = %e, "Product fetch failed"),
            Err(e) => warn!(error = %e, "Product fetch task failed"),
        }
    }

    let report = ValidationReport {
        lines: lines
            .iter()
            .map(|line| {
                let (availability, issue) = match products.get(&line.produit_id) {
                    Some(product) => {
                        let (a, issue) = assess_line(product, line);
                        (Some(a), issue)
                    }
                    None => (None, Some(StockIssue::ProductUnavailable)),
                };
                LineReport {
                    key: line.key(),
                    nom: line.nom.clone(),
                    requested: line.quantite,
                    availability,
                    issue,
                }
            })
            .collect(),
    };

    for notice in report.notices() {
        match notice.severity() {
            Severity::Warning => warn!(product_id = %notice.key.produit_id, "{}", notice.message()),
            Severity::Error => warn!(product_id = %notice.key.produit_id, blocking = true, "{}", notice.message()),
        }
    }
    if report.can_submit() {
        info!("Cart validated");
    } else {
        debug!("Cart has blocking stock issues");
    }
    report
}
