use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use exportdesk_core::{ExportFormat, ExportParams, JobStatus, TaskId};
use exportdesk_infra::{
    ApiConfig, BackendError, ExportApi, HttpBackend, ListRequest, StatusClient, SubmitResponse,
    classify_submit_response,
};
use serde_json::{Value, json};

#[derive(Clone, Default)]
struct Recorded {
    requests: Arc<Mutex<Vec<String>>>,
}

impl Recorded {
    fn push(&self, line: String) {
        self.requests.lock().unwrap().push(line);
    }

    fn all(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

fn auth(headers: &HeaderMap) -> String {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

async fn submit(State(rec): State<Recorded>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    rec.push(format!("submit auth={} body={}", auth(&headers), body));
    if body["account_id"] == "0" {
        return (StatusCode::BAD_REQUEST, Json(json!({"detail": "Account 0 does not exist"})))
            .into_response();
    }
    Json(json!({"task_id": "t-1"})).into_response()
}

async fn status(Path(task_id): Path<String>) -> Response {
    match task_id.as_str() {
        "down" => (StatusCode::BAD_GATEWAY, "<html><body>proxy error</body></html>").into_response(),
        "garbled" => (StatusCode::OK, "not json").into_response(),
        _ => Json(json!({
            "status": "SUCCESS",
            "result": {"file_path": format!("/exports/{task_id}.csv")}
        }))
        .into_response(),
    }
}

async fn transactions(
    State(rec): State<Recorded>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let mut keys: Vec<_> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
    keys.sort();
    rec.push(format!("list {}", keys.join("&")));

    Json(json!({
        "count": 2,
        "next": null,
        "results": [
            {"id": 1, "time": "2024-01-02T09:00:00Z", "account": "Main", "transaction_type": "Credit", "amount": "100.00", "purpose": "Invoice 1"},
            {"id": 2, "time": "2024-01-01T09:00:00Z", "account": "Main", "transaction_type": "Debit", "amount": 40, "purpose": "Fees"}
        ]
    }))
}

struct TestServer {
    base_url: String,
    recorded: Recorded,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let recorded = Recorded::default();
        let app = Router::new()
            .route("/api/export-transactions/", post(submit))
            .route("/api/export-status/:task_id/", get(status))
            .route("/api/transactions/", get(transactions))
            .with_state(recorded.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}/api", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            recorded,
            handle,
        }
    }

    fn backend(&self) -> HttpBackend {
        HttpBackend::new(ApiConfig::new(&self.base_url).with_token("secret")).unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn submit_posts_flat_filters_with_bearer_token() {
    let server = TestServer::spawn().await;
    let query = ExportParams::new(ExportFormat::Csv)
        .filter("account_id", "7")
        .filter("transaction_type", "Credit")
        .to_query()
        .unwrap();

    let body = server.backend().submit_export(&query).await.unwrap();
    assert_eq!(
        classify_submit_response(&body),
        SubmitResponse::Task { task_id: TaskId::new("t-1") }
    );

    let recorded = server.recorded.all();
    assert_eq!(recorded.len(), 1);
    assert!(recorded[0].contains("auth=Bearer secret"));
    assert!(recorded[0].contains(r#""account_id":"7""#));
    assert!(recorded[0].contains(r#""format":"csv""#));
}

#[tokio::test]
async fn api_errors_carry_the_backend_detail() {
    let server = TestServer::spawn().await;
    let query = ExportParams::new(ExportFormat::Csv)
        .filter("account_id", "0")
        .to_query()
        .unwrap();

    let err = server.backend().submit_export(&query).await.unwrap_err();
    assert_eq!(
        err,
        BackendError::Api { status: 400, message: "Account 0 does not exist".into() }
    );
}

#[tokio::test]
async fn status_success_maps_to_file_path() {
    let server = TestServer::spawn().await;
    let resp = server.backend().export_status(&TaskId::new("t-1")).await.unwrap();

    let update = resp.to_update().unwrap();
    assert_eq!(update.status, JobStatus::Success);
    assert_eq!(update.file_path.as_deref(), Some("/exports/t-1.csv"));
}

#[tokio::test]
async fn html_error_pages_fall_back_to_reason_phrase() {
    let server = TestServer::spawn().await;
    let err = server.backend().export_status(&TaskId::new("down")).await.unwrap_err();
    assert_eq!(err.message(), "502 Bad Gateway");
}

#[tokio::test]
async fn malformed_bodies_are_parse_errors() {
    let server = TestServer::spawn().await;
    let err = server.backend().export_status(&TaskId::new("garbled")).await.unwrap_err();
    assert!(matches!(err, BackendError::Parse(_)));
}

#[tokio::test]
async fn list_sends_paging_and_filters() {
    let server = TestServer::spawn().await;
    let query = ExportParams::new(ExportFormat::Pdf)
        .filter("account_id", "7")
        .to_query()
        .unwrap();

    let page = server
        .backend()
        .list_transactions(&ListRequest::new(query, 1, 500))
        .await
        .unwrap();
    assert_eq!(page.total_count(), Some(2));
    assert_eq!(page.rows()[1].purpose, "Fees");

    let recorded = server.recorded.all();
    assert_eq!(recorded, vec!["list account_id=7&ordering=-time&page=1&page_size=500".to_string()]);
}

#[tokio::test]
async fn unreachable_backend_is_a_network_error() {
    let backend = HttpBackend::new(ApiConfig::new("http://127.0.0.1:9/api")).unwrap();
    let err = backend.export_status(&TaskId::new("t-1")).await.unwrap_err();
    assert!(matches!(err, BackendError::Network(_)));
}
