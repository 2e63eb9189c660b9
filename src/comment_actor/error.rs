use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CommentError {
    #[error("Comment not found: {0}")]
    NotFound(String),
    #[error("Invalid product: {0}")]
    InvalidProduct(String),
    #[error("Comment validation error: {0}")]
    ValidationError(String),
    #[error("Actor communication error: {0}")]
    ActorCommunicationError(String),
}
