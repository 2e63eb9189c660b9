//! Rows of the hosted store and the client-side cart types.

pub mod cart;
pub mod comment;
pub mod order;
pub mod product;

pub use cart::*;
pub use comment::*;
pub use order::*;
pub use product::*;
