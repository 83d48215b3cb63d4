//! reqwest implementation of the backend traits.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;

use exportdesk_core::{ExportQuery, TaskId};

use super::{BackendError, ExportApi, ListRequest, StatusClient, StatusResponse, TransactionPage};
use super::classify::backend_message;
use crate::config::ApiConfig;

/// HTTP client for the export endpoints. Cheap to clone.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    config: ApiConfig,
}

impl HttpBackend {
    pub fn new(config: ApiConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| BackendError::Network(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut req = self.client.request(method, self.config.endpoint(path));
        if let Some(token) = &self.config.token {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, BackendError> {
        let resp = req
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                message: backend_message(status.as_u16(), status.canonical_reason(), &body),
            });
        }

        resp.json::<T>()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ExportApi for HttpBackend {
    async fn submit_export(&self, query: &ExportQuery) -> Result<Value, BackendError> {
        tracing::debug!(format = %query.format, "submitting export");
        let req = self.request(Method::POST, "export-transactions/").json(query);
        self.send_json(req).await
    }

    async fn list_transactions(&self, request: &ListRequest) -> Result<TransactionPage, BackendError> {
        let req = self
            .request(Method::GET, "transactions/")
            .query(&request.query_pairs());
        self.send_json(req).await
    }
}

#[async_trait]
impl StatusClient for HttpBackend {
    async fn export_status(&self, task_id: &TaskId) -> Result<StatusResponse, BackendError> {
        let path = format!("export-status/{}/", task_id.as_str());
        self.send_json(self.request(Method::GET, &path)).await
    }
}
