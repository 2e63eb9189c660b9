//! Visitor-side state: the persisted cart and wishlist, stock checks over
//! the cart and the checkout flow.

pub mod cart;
pub mod checkout;
pub mod reconciler;
pub mod storage;
pub mod watcher;
pub mod wishlist;

pub use cart::{CartError, CartStore};
pub use checkout::{Checkout, CheckoutError};
pub use reconciler::{validate_cart, Severity, StockIssue, StockNotice, ValidationReport};
pub use storage::{LocalStorage, StorageError};
pub use watcher::{StockWatcher, WatcherClient, WatcherError};
pub use wishlist::{WishlistError, WishlistStore};
