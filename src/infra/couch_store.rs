use crate::app::ports::{InstanceStorePort, StoreError};
use crate::error::Result;
use crate::types::ServiceInstanceRecord;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

/// Instance store backed by a CouchDB-compatible document database
pub struct CouchInstanceStore {
    client: reqwest::Client,
    base_url: String,
    database: String,
}

impl CouchInstanceStore {
    pub fn new(base_url: &str, database: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            database: database.to_string(),
        })
    }

    fn document_url(&self, id: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.database, id)
    }
}

#[async_trait]
impl InstanceStorePort for CouchInstanceStore {
    async fn get(&self, instance_id: &str) -> std::result::Result<ServiceInstanceRecord, StoreError> {
        let url = self.document_url(instance_id);
        debug!("GET {}", url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Backend(format!("store returned {}: {}", status, body)));
        }

        resp.json::<ServiceInstanceRecord>()
            .await
            .map_err(|e| StoreError::Backend(format!("invalid service instance document: {}", e)))
    }
}
