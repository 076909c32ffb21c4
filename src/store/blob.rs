//! HTTP client for the object storage gateway.

use crate::config::get_config;
use crate::store::types::StoreError;
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};

/// Operations the persistence coordinator needs from object storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under a path, replacing any existing object.
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Fetch the object stored at a path.
    async fn get(&self, path: &str) -> Result<Vec<u8>, StoreError>;

    /// Remove the object stored at a path.
    async fn delete(&self, path: &str) -> Result<(), StoreError>;
}

/// Lightweight HTTP client for bucket-scoped object operations.
pub struct HttpBlobStore {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) bucket: String,
    pub(crate) api_key: Option<String>,
}

impl HttpBlobStore {
    /// Construct a new client using configuration derived from the environment.
    pub fn from_config() -> Result<Self, StoreError> {
        let config = get_config();
        let client = Client::builder().user_agent("skillscope/blob").build()?;
        let base_url =
            normalize_base_url(&config.blob_store_url).map_err(StoreError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            bucket = %config.blob_bucket,
            has_api_key = config.blob_api_key.is_some(),
            "Initialized blob store HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            bucket: config.blob_bucket.clone(),
            api_key: config.blob_api_key.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.bucket,
            path.trim_start_matches('/')
        );
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut req = self.request(Method::PUT, path).body(bytes);
        if let Some(content_type) = content_type {
            req = req.header("content-type", content_type);
        }
        let response = req.send().await?;

        if response.status().is_success() {
            tracing::debug!(path, "Blob stored");
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = StoreError::UnexpectedStatus { status, body };
            tracing::error!(path, error = %error, "Blob write failed");
            Err(error)
        }
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let response = self.request(Method::GET, path).send().await?;

        match response.status() {
            status if status.is_success() => Ok(response.bytes().await?.to_vec()),
            StatusCode::NOT_FOUND => Err(StoreError::NotFound {
                path: path.to_string(),
            }),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = StoreError::UnexpectedStatus { status, body };
                tracing::error!(path, error = %error, "Blob read failed");
                Err(error)
            }
        }
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let response = self.request(Method::DELETE, path).send().await?;

        if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(path, "Blob deleted");
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = StoreError::UnexpectedStatus { status, body };
            tracing::error!(path, error = %error, "Blob delete failed");
            Err(error)
        }
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}
