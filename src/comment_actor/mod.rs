//! Customer reviews with ratings and image attachments.

pub mod entity;
pub mod error;

pub use error::*;
