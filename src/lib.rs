//! Storefront core for Maison Slimani: catalog, cart and checkout with
//! stock reconciliation, customer reviews, and the admin dashboard's live
//! order counters.
//!
//! Each hosted table (`produits`, `commandes`, `commentaires`) is owned by a
//! [`actor_framework::ResourceActor`] that publishes row changes on a
//! [`realtime::ChangeFeed`]. Services subscribe to that feed to keep derived
//! state current.

pub mod actor_framework;
pub mod admin;
pub mod api;
pub mod app_system;
pub mod bus;
pub mod clients;
pub mod comment_actor;
pub mod config;
pub mod domain;
pub mod order_actor;
pub mod product_actor;
pub mod realtime;
pub mod storefront;

#[cfg(test)]
mod mock_framework;
