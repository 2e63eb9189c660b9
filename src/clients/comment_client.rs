use tracing::{debug, info, instrument};

use crate::actor_framework::{ResourceClient, RowFilter};
use crate::clients::ProductClient;
use crate::comment_actor::CommentError;
use crate::domain::{Comment, CommentCreate, CommentPatch, RatingSummary};

/// Client for the comments table (`/api/commentaires`).
#[derive(Clone)]
pub struct CommentClient {
    inner: ResourceClient<Comment>,
    product_client: ProductClient,
}

impl CommentClient {
    pub fn new(inner: ResourceClient<Comment>, product_client: ProductClient) -> Self {
        Self { inner, product_client }
    }

    /// Posts a new, unapproved comment on an existing product.
    #[instrument(skip(self, params), fields(product_id = %params.produit_id, note = params.note))]
    pub async fn create_comment(&self, params: CommentCreate) -> Result<Comment, CommentError> {
        debug!("Sending request");
        params.validate().map_err(CommentError::ValidationError)?;

        match self.product_client.get_product(params.produit_id.clone()).await {
            Ok(Some(_)) => {}
            Ok(None) => return Err(CommentError::InvalidProduct(params.produit_id)),
            Err(e) => return Err(CommentError::ActorCommunicationError(e.to_string())),
        }

        let id = self.inner.create(params).await?;
        let comment = self
            .inner
            .get(id.clone())
            .await?
            .ok_or(CommentError::NotFound(id))?;
        info!(comment_id = %comment.id, "Comment created");
        Ok(comment)
    }

    /// Comments of a product, newest first.
    #[instrument(skip(self))]
    pub async fn list_for_product(
        &self,
        produit_id: String,
        approved_only: bool,
    ) -> Result<Vec<Comment>, CommentError> {
        debug!("Sending request");
        let filter = RowFilter::new(move |c: &Comment| {
            c.produit_id == produit_id && (!approved_only || c.approuve)
        });
        let mut comments = self.inner.list(filter).await?;
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(comments)
    }

    /// Every comment, newest first (admin moderation list).
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<Comment>, CommentError> {
        let mut comments = self.inner.list(RowFilter::all()).await?;
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(comments)
    }

    #[instrument(skip(self, patch))]
    pub async fn update_comment(&self, id: String, patch: CommentPatch) -> Result<Comment, CommentError> {
        debug!("Sending request");
        Ok(self.inner.update(id, patch).await?)
    }

    #[instrument(skip(self))]
    pub async fn approve(&self, id: String) -> Result<Comment, CommentError> {
        let patch = CommentPatch {
            approuve: Some(true),
            ..CommentPatch::default()
        };
        Ok(self.inner.update(id, patch).await?)
    }

    /// Rating over approved comments only.
    #[instrument(skip(self))]
    pub async fn rating_summary(&self, produit_id: String) -> Result<RatingSummary, CommentError> {
        let comments = self.list_for_product(produit_id, true).await?;
        Ok(RatingSummary::from_notes(comments.iter().map(|c| c.note)))
    }
}

impl_client_methods!(CommentClient, Comment, CommentError, comment);
