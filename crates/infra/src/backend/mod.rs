//! Backend collaborator contract.
//!
//! Three endpoints matter to exports:
//!
//! ```text
//! POST {base}/export-transactions/          submit an export
//! GET  {base}/export-status/{task_id}/      poll a queued export
//! GET  {base}/transactions/?page=..         list rows (client-side fallback)
//! ```
//!
//! The traits exist so the builder and the tracker can run against scripted
//! backends in tests; [`HttpBackend`] is the reqwest implementation.

mod classify;
mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use exportdesk_core::{ExportQuery, JobStatus, Progress, StatusUpdate, TaskId, Transaction};

pub use classify::{SubmitResponse, backend_message, classify_submit_response};
pub use http::HttpBackend;

/// Transport-level failure talking to the backend.
///
/// Never shown to users directly; operations convert it into an `ExportError`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("network error: {0}")]
    Network(String),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("parse error: {0}")]
    Parse(String),
}

impl BackendError {
    /// The most user-meaningful part of the error.
    pub fn message(&self) -> &str {
        match self {
            BackendError::Network(msg) | BackendError::Parse(msg) => msg,
            BackendError::Api { message, .. } => message,
        }
    }
}

/// Submission and row listing.
#[async_trait]
pub trait ExportApi: Send + Sync {
    /// Submit an export. The body is returned raw; see [`classify_submit_response`].
    async fn submit_export(&self, query: &ExportQuery) -> Result<Value, BackendError>;

    /// Fetch one page of transactions matching the query's filters.
    async fn list_transactions(&self, request: &ListRequest) -> Result<TransactionPage, BackendError>;
}

/// Status polling for queued exports.
#[async_trait]
pub trait StatusClient: Send + Sync {
    async fn export_status(&self, task_id: &TaskId) -> Result<StatusResponse, BackendError>;
}

/// Body of `GET export-status/{task_id}/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    /// `{current, total}` while running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,
    /// `{file_path}` on success; a reason string or object on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

const FAILURE_FALLBACK: &str = "export failed";

impl StatusResponse {
    pub fn with_status(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            info: None,
            result: None,
            error: None,
        }
    }

    pub fn pending() -> Self {
        Self::with_status("PENDING")
    }

    pub fn started(current: u64, total: u64) -> Self {
        let mut resp = Self::with_status("STARTED");
        resp.info = Some(serde_json::json!({ "current": current, "total": total }));
        resp
    }

    pub fn success(file_path: impl Into<String>) -> Self {
        let mut resp = Self::with_status("SUCCESS");
        resp.result = Some(serde_json::json!({ "file_path": file_path.into() }));
        resp
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        let mut resp = Self::with_status("FAILURE");
        resp.result = Some(Value::String(reason.into()));
        resp
    }

    pub fn progress(&self) -> Option<Progress> {
        let info = self.info.as_ref()?.as_object()?;
        let current = as_count(info.get("current")?)?;
        let total = as_count(info.get("total")?)?;
        Some(Progress::new(current, total))
    }

    pub fn file_path(&self) -> Option<String> {
        self.result
            .as_ref()?
            .get("file_path")?
            .as_str()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
    }

    /// Failure reason from `result` (string or `{error|detail|message}`), then `error`.
    pub fn failure_reason(&self) -> String {
        self.result
            .as_ref()
            .and_then(reason_text)
            .or_else(|| self.error.as_ref().and_then(reason_text))
            .unwrap_or_else(|| FAILURE_FALLBACK.to_string())
    }

    /// Map onto the job lifecycle. `None` for statuses this client does not know.
    pub fn to_update(&self) -> Option<StatusUpdate> {
        let status = JobStatus::from_backend(&self.status)?;
        let mut update = StatusUpdate::new(status);
        match status {
            JobStatus::Started => update.progress = self.progress(),
            JobStatus::Success => update.file_path = self.file_path(),
            JobStatus::Failure => update.error = Some(self.failure_reason()),
            JobStatus::Pending => {}
        }
        Some(update)
    }
}

fn as_count(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

fn reason_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Object(map) => ["error", "detail", "message", "exc_message"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(|s| s.trim().to_string())?,
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// One page of `GET transactions/`.
///
/// Paginated endpoints answer `{count, next, results}`; unpaginated ones answer a
/// bare array, which is the complete set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TransactionPage {
    Paginated {
        count: u64,
        #[serde(default)]
        next: Option<String>,
        results: Vec<Transaction>,
    },
    Complete(Vec<Transaction>),
}

impl TransactionPage {
    /// Total rows across all pages, when the backend reports it.
    pub fn total_count(&self) -> Option<u64> {
        match self {
            TransactionPage::Paginated { count, .. } => Some(*count),
            TransactionPage::Complete(_) => None,
        }
    }

    pub fn rows(&self) -> &[Transaction] {
        match self {
            TransactionPage::Paginated { results, .. } => results,
            TransactionPage::Complete(rows) => rows,
        }
    }

    pub fn into_rows(self) -> Vec<Transaction> {
        match self {
            TransactionPage::Paginated { results, .. } => results,
            TransactionPage::Complete(rows) => rows,
        }
    }
}

/// Paging parameters for the list endpoint, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub query: ExportQuery,
    pub page: u32,
    pub page_size: u32,
}

impl ListRequest {
    pub fn new(query: ExportQuery, page: u32, page_size: u32) -> Self {
        Self {
            query,
            page,
            page_size,
        }
    }

    /// URL query pairs: the filters, then `page`, `page_size`, `ordering=-time`.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .query
            .pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        pairs.push(("page".to_string(), self.page.to_string()));
        pairs.push(("page_size".to_string(), self.page_size.to_string()));
        pairs.push(("ordering".to_string(), "-time".to_string()));
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exportdesk_core::ExportFormat;
    use serde_json::json;

    #[test]
    fn started_status_carries_progress() {
        let resp: StatusResponse =
            serde_json::from_value(json!({"status": "PROGRESS", "info": {"current": 40, "total": "80"}}))
                .unwrap();
        let update = resp.to_update().unwrap();
        assert_eq!(update.status, JobStatus::Started);
        assert_eq!(update.progress, Some(Progress::new(40, 80)));
    }

    #[test]
    fn success_status_carries_file_path() {
        let resp: StatusResponse = serde_json::from_value(
            json!({"status": "SUCCESS", "result": {"file_path": "/exports/t-1.csv"}}),
        )
        .unwrap();
        let update = resp.to_update().unwrap();
        assert_eq!(update.status, JobStatus::Success);
        assert_eq!(update.file_path.as_deref(), Some("/exports/t-1.csv"));
    }

    #[test]
    fn failure_reason_prefers_result_then_error() {
        let resp: StatusResponse =
            serde_json::from_value(json!({"status": "FAILURE", "result": {"exc_message": "disk full"}}))
                .unwrap();
        assert_eq!(resp.failure_reason(), "disk full");

        let resp: StatusResponse =
            serde_json::from_value(json!({"status": "FAILURE", "error": "worker lost"})).unwrap();
        assert_eq!(resp.failure_reason(), "worker lost");

        assert_eq!(StatusResponse::with_status("FAILURE").failure_reason(), "export failed");
    }

    #[test]
    fn unknown_status_has_no_update() {
        assert!(StatusResponse::with_status("DEFERRED").to_update().is_none());
    }

    #[test]
    fn page_shapes() {
        let paged: TransactionPage =
            serde_json::from_value(json!({"count": 3, "next": null, "results": [{"id": 1}]})).unwrap();
        assert_eq!(paged.total_count(), Some(3));
        assert_eq!(paged.rows().len(), 1);

        let bare: TransactionPage = serde_json::from_value(json!([{"id": 1}, {"id": 2}])).unwrap();
        assert_eq!(bare.total_count(), None);
        assert_eq!(bare.into_rows().len(), 2);
    }

    #[test]
    fn list_request_orders_newest_first() {
        let mut query = ExportQuery::new(ExportFormat::Csv);
        query.filters.insert("account_id".into(), "7".into());
        let pairs = ListRequest::new(query, 2, 500).query_pairs();

        assert!(pairs.contains(&("account_id".into(), "7".into())));
        assert!(pairs.contains(&("page".into(), "2".into())));
        assert!(pairs.contains(&("page_size".into(), "500".into())));
        assert!(pairs.contains(&("ordering".into(), "-time".into())));
        assert!(!pairs.iter().any(|(k, _)| k == "format"));
    }
}
