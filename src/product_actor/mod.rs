//! Catalog rows and the stock reservations run inside the product actor.

pub mod actions;
pub mod entity;
pub mod error;

pub use actions::{ProductAction, ProductActionResult, StockSelection};
pub use error::ProductError;
