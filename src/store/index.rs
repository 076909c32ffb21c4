//! HTTP client for the sorted metadata index.
//!
//! The index partitions records by owner and sorts each partition by the creation
//! timestamp. Lookups by analysis id are not supported server-side; callers that need
//! them scan the owner's partition (see the coordinator's delete path).

use crate::config::get_config;
use crate::store::types::{AnalysisRecord, StoreError};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::json;

/// Operations the persistence coordinator needs from the metadata index.
#[async_trait]
pub trait RecordIndex: Send + Sync {
    /// Insert a record into the owner's partition.
    async fn put_record(&self, record: &AnalysisRecord) -> Result<(), StoreError>;

    /// Return every record in the owner's partition, sorted by creation time.
    async fn query_by_owner(
        &self,
        owner_id: &str,
        descending: bool,
    ) -> Result<Vec<AnalysisRecord>, StoreError>;

    /// Remove the record at the given partition/sort-key pair.
    async fn delete_record(&self, owner_id: &str, created_at: i64) -> Result<(), StoreError>;
}

/// Lightweight HTTP client for table-scoped record operations.
pub struct HttpRecordIndex {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) table: String,
    pub(crate) api_key: Option<String>,
}

#[derive(Deserialize)]
struct QueryResponse {
    records: Vec<AnalysisRecord>,
}

impl HttpRecordIndex {
    /// Construct a new client using configuration derived from the environment.
    pub fn from_config() -> Result<Self, StoreError> {
        let config = get_config();
        let client = Client::builder().user_agent("skillscope/index").build()?;
        let base_url =
            normalize_base_url(&config.metadata_store_url).map_err(StoreError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            table = %config.metadata_table,
            has_api_key = config.metadata_api_key.is_some(),
            "Initialized metadata index HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            table: config.metadata_table.clone(),
            api_key: config.metadata_api_key.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!(
            "{}/tables/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.table,
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

    async fn ensure_success(&self, response: reqwest::Response) -> Result<(), StoreError> {
        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = StoreError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Metadata index request failed");
            Err(error)
        }
    }
}

#[async_trait]
impl RecordIndex for HttpRecordIndex {
    async fn put_record(&self, record: &AnalysisRecord) -> Result<(), StoreError> {
        let response = self
            .request(Method::PUT, "records")
            .json(record)
            .send()
            .await?;
        self.ensure_success(response).await?;
        tracing::debug!(
            owner_id = %record.owner_id,
            analysis_id = %record.analysis_id,
            "Metadata record stored"
        );
        Ok(())
    }

    async fn query_by_owner(
        &self,
        owner_id: &str,
        descending: bool,
    ) -> Result<Vec<AnalysisRecord>, StoreError> {
        let body = json!({
            "owner_id": owner_id,
            "descending": descending,
        });
        let response = self
            .request(Method::POST, "query")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = StoreError::UnexpectedStatus { status, body };
            tracing::error!(owner_id, error = %error, "Metadata query failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        Ok(payload.records)
    }

    async fn delete_record(&self, owner_id: &str, created_at: i64) -> Result<(), StoreError> {
        let response = self
            .request(Method::DELETE, &format!("records/{owner_id}/{created_at}"))
            .send()
            .await?;
        self.ensure_success(response).await?;
        tracing::debug!(owner_id, created_at, "Metadata record deleted");
        Ok(())
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}
