//! System orchestration, startup, and shutdown logic.

pub mod storefront_system;
pub mod tracing;

pub use self::storefront_system::*;
pub use self::tracing::*;
