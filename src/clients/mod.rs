//! Typed handles in front of the table actors.

#[macro_use]
pub mod macros;
pub mod comment_client;
pub mod order_client;
pub mod product_client;

pub use comment_client::CommentClient;
pub use order_client::OrderClient;
pub use product_client::ProductClient;

use tokio::sync::oneshot;

use crate::comment_actor::CommentError;
use crate::order_actor::OrderError;
use crate::product_actor::ProductError;

impl_from_framework_error!(ProductError);
impl_from_framework_error!(OrderError);
impl_from_framework_error!(CommentError);

/// Generic type aliases for service communication
pub type ServiceResult<T, E> = std::result::Result<T, E>;
pub type ServiceResponse<T, E> = oneshot::Sender<ServiceResult<T, E>>;
