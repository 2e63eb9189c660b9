//! HTTP client for the storefront's `/api` routes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{ApiError, OrderAdmin, OrderSource, OrderSubmitter, ProductSource};
use crate::domain::{Comment, CommentCreate, CommentPatch, Order, OrderCreate, OrderPatch, OrderStatus, Product};

/// Every route answers `{ data, error? }`.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_data(self, what: &str) -> Result<T, ApiError> {
        if let Some(error) = self.error {
            return Err(ApiError::Server { status: 200, message: error });
        }
        self.data
            .ok_or_else(|| ApiError::InvalidResponse(format!("Missing {} data", what)))
    }
}

/// Maps a non-success status to the error the caller can act on.
pub fn status_error(status: StatusCode, body: &str) -> ApiError {
    let message = serde_json::from_str::<ApiResponse<serde_json::Value>>(body)
        .ok()
        .and_then(|r| r.error)
        .unwrap_or_else(|| body.to_string());

    match status {
        StatusCode::NOT_FOUND => ApiError::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ApiError::Validation(message),
        StatusCode::CONFLICT => ApiError::Conflict(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized,
        _ => ApiError::Server {
            status: status.as_u16(),
            message,
        },
    }
}

#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    base_url: Url,
}

type Query<'a> = &'a [(&'a str, &'a str)];

impl HttpApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url).map_err(|e| ApiError::InvalidBaseUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl(base_url.to_string()));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Appends path segments to the base URL; each segment is escaped, so an
    /// id cannot change the route.
    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn prepare(&self, method: Method, segments: &[&str], query: Query<'_>) -> Result<RequestBuilder, ApiError> {
        let url = self.url(segments)?;
        debug!(%method, %url, "API request");
        let mut request = self.client.request(method, url);
        if !query.is_empty() {
            request = request.query(query);
        }
        Ok(request)
    }

    async fn request<T, B>(
        &self,
        method: Method,
        segments: &[&str],
        query: Query<'_>,
        body: Option<&B>,
    ) -> Result<ApiResponse<T>, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut request = self.prepare(method, segments, query)?;
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(status_error(status, &text));
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str], query: Query<'_>) -> Result<ApiResponse<T>, ApiError> {
        self.request::<T, ()>(Method::GET, segments, query, None).await
    }

    async fn delete(&self, segments: &[&str]) -> Result<(), ApiError> {
        let response = self
            .request::<serde_json::Value, ()>(Method::DELETE, segments, &[], None)
            .await?;
        match response.error {
            Some(message) => Err(ApiError::Server { status: 200, message }),
            None => Ok(()),
        }
    }

    // ========== Catalog ==========

    #[instrument(skip(self))]
    pub async fn product(&self, id: &str) -> Result<Product, ApiError> {
        self.get::<Product>(&["api", "produits", id], &[])
            .await?
            .into_data("product")
    }

    // ========== Orders ==========

    #[instrument(skip(self, order), fields(lignes = order.lignes.len()))]
    pub async fn create_order(&self, order: &OrderCreate) -> Result<Order, ApiError> {
        self.request::<Order, _>(Method::POST, &["api", "commandes"], &[], Some(order))
            .await?
            .into_data("order")
    }

    #[instrument(skip(self))]
    pub async fn admin_orders(&self, statut: OrderStatus) -> Result<Vec<Order>, ApiError> {
        self.get::<Vec<Order>>(&["api", "admin", "commandes"], &[("statut", statut.as_str())])
            .await?
            .into_data("orders")
    }

    #[instrument(skip(self))]
    pub async fn set_order_status(&self, id: &str, statut: OrderStatus) -> Result<Order, ApiError> {
        self.request::<Order, _>(Method::PATCH, &["api", "admin", "commandes", id], &[], Some(&OrderPatch { statut }))
            .await?
            .into_data("order")
    }

    #[instrument(skip(self))]
    pub async fn delete_order(&self, id: &str) -> Result<(), ApiError> {
        self.delete(&["api", "admin", "commandes", id]).await
    }

    // ========== Comments ==========

    #[instrument(skip(self))]
    pub async fn comments(&self, produit_id: &str) -> Result<Vec<Comment>, ApiError> {
        self.get::<Vec<Comment>>(&["api", "commentaires"], &[("produit_id", produit_id)])
            .await?
            .into_data("comments")
    }

    #[instrument(skip(self, comment), fields(produit_id = %comment.produit_id))]
    pub async fn create_comment(&self, comment: &CommentCreate) -> Result<Comment, ApiError> {
        self.request::<Comment, _>(Method::POST, &["api", "commentaires"], &[], Some(comment))
            .await?
            .into_data("comment")
    }

    #[instrument(skip(self, patch))]
    pub async fn update_comment(&self, id: &str, patch: &CommentPatch) -> Result<Comment, ApiError> {
        self.request::<Comment, _>(Method::PATCH, &["api", "commentaires", id], &[], Some(patch))
            .await?
            .into_data("comment")
    }

    #[instrument(skip(self))]
    pub async fn delete_comment(&self, id: &str) -> Result<(), ApiError> {
        self.delete(&["api", "commentaires", id]).await
    }
}

#[async_trait]
impl ProductSource for HttpApi {
    async fn fetch_product(&self, id: &str) -> Result<Product, ApiError> {
        self.product(id).await
    }
}

#[async_trait]
impl OrderSource for HttpApi {
    async fn orders_by_status(&self, statut: OrderStatus) -> Result<Vec<Order>, ApiError> {
        self.admin_orders(statut).await
    }
}

#[async_trait]
impl OrderSubmitter for HttpApi {
    async fn submit_order(&self, order: OrderCreate) -> Result<Order, ApiError> {
        self.create_order(&order).await
    }
}

#[async_trait]
impl OrderAdmin for HttpApi {
    async fn update_order_status(&self, id: &str, statut: OrderStatus) -> Result<Order, ApiError> {
        self.set_order_status(id, statut).await
    }

    async fn remove_order(&self, id: &str) -> Result<(), ApiError> {
        self.delete_order(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(base: &str) -> HttpApi {
        HttpApi::new(base, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn urls_join_without_double_slashes() {
        for base in ["http://localhost:3000", "http://localhost:3000/"] {
            let url = api(base).url(&["api", "produits", "p1"]).unwrap();
            assert_eq!(url.as_str(), "http://localhost:3000/api/produits/p1");
        }
        let url = api("https://maison-slimani.com/boutique/").url(&["api", "commandes"]).unwrap();
        assert_eq!(url.as_str(), "https://maison-slimani.com/boutique/api/commandes");
    }

    #[test]
    fn ids_cannot_escape_their_path_segment() {
        let url = api("http://localhost:3000").url(&["api", "produits", "p1/../admin?x=1#y"]).unwrap();
        assert_eq!(url.path_segments().map(|s| s.count()), Some(3));
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
        assert!(url.path().starts_with("/api/produits/p1%2F"));
    }

    #[test]
    fn query_values_are_encoded() {
        let request = api("http://localhost:3000")
            .prepare(Method::GET, &["api", "admin", "commandes"], &[("statut", OrderStatus::Expediee.as_str())])
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(request.url().path(), "/api/admin/commandes");
        assert_eq!(request.url().query(), Some("statut=Exp%C3%A9di%C3%A9e"));

        let request = api("http://localhost:3000")
            .prepare(Method::GET, &["api", "commentaires"], &[("produit_id", "p1&statut=approuve")])
            .unwrap()
            .build()
            .unwrap();
        let pairs: Vec<_> = request.url().query_pairs().collect();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].1, "p1&statut=approuve");
    }

    #[test]
    fn base_url_must_be_absolute() {
        assert!(matches!(
            HttpApi::new("localhost:3000/api", Duration::from_secs(5)),
            Err(ApiError::InvalidBaseUrl(_))
        ));
        assert!(matches!(
            HttpApi::new("/api", Duration::from_secs(5)),
            Err(ApiError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn envelope_without_data_is_invalid() {
        let response: ApiResponse<Product> = serde_json::from_str(r#"{"data": null}"#).unwrap();
        assert!(matches!(response.into_data("product"), Err(ApiError::InvalidResponse(_))));

        let response: ApiResponse<Product> =
            serde_json::from_str(r#"{"data": null, "error": "indisponible"}"#).unwrap();
        match response.into_data("product") {
            Err(ApiError::Server { message, .. }) => assert_eq!(message, "indisponible"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn envelope_decodes_product_payload() {
        let body = r#"{"data": {"id": "p1", "nom": "Babouche", "prix": 250.0, "stock": 4}}"#;
        let response: ApiResponse<Product> = serde_json::from_str(body).unwrap();
        let product = response.into_data("product").unwrap();
        assert_eq!(product.nom, "Babouche");
        assert_eq!(product.stock, Some(4));
    }

    #[test]
    fn statuses_map_to_actionable_errors() {
        let conflict = status_error(StatusCode::CONFLICT, r#"{"error": "Stock insuffisant pour Sac"}"#);
        match conflict {
            ApiError::Conflict(message) => assert_eq!(message, "Stock insuffisant pour Sac"),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(status_error(StatusCode::NOT_FOUND, ""), ApiError::NotFound(_)));
        assert!(matches!(status_error(StatusCode::UNPROCESSABLE_ENTITY, "x"), ApiError::Validation(_)));
        assert!(matches!(status_error(StatusCode::FORBIDDEN, "x"), ApiError::Unauthorized));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, "upstream"),
            ApiError::Server { status: 502, .. }
        ));
    }
}
