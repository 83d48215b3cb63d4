//! Interpreting backend response bodies.

use serde_json::Value;

use exportdesk_core::TaskId;

/// What a `POST export-transactions/` response asks the client to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitResponse {
    /// Queued on the backend; poll the task.
    Task { task_id: TaskId },
    /// Generated synchronously; the file is already on the server.
    File { file_path: String },
    /// No task queue available; the backend echoed the rows inline.
    Inline { row_count: usize },
    /// None of the above.
    Unrecognized,
}

/// Classify a submit response body.
///
/// Precedence is `task_id` > `file_path` > `transactions`. Empty strings count as absent.
pub fn classify_submit_response(body: &Value) -> SubmitResponse {
    let Some(obj) = body.as_object() else {
        return SubmitResponse::Unrecognized;
    };

    let task_id = match obj.get("task_id") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    if let Some(task_id) = task_id {
        return SubmitResponse::Task {
            task_id: TaskId::new(task_id),
        };
    }

    if let Some(path) = obj.get("file_path").and_then(Value::as_str) {
        let path = path.trim();
        if !path.is_empty() {
            return SubmitResponse::File {
                file_path: path.to_string(),
            };
        }
    }

    if let Some(rows) = obj.get("transactions").and_then(Value::as_array) {
        return SubmitResponse::Inline {
            row_count: rows.len(),
        };
    }

    SubmitResponse::Unrecognized
}

const MAX_RAW_BODY: usize = 200;

/// Best-effort human message for a failed response.
///
/// Order: `detail`, `error`, `message` of a JSON body, then the raw body, then
/// the HTTP reason phrase.
pub fn backend_message(status: u16, reason: Option<&str>, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        for key in ["detail", "error", "message"] {
            if let Some(text) = json.get(key).and_then(message_text) {
                return text;
            }
        }
    }

    let raw = body.trim();
    if !raw.is_empty() && !looks_like_html(raw) {
        return truncate(raw, MAX_RAW_BODY);
    }

    match reason {
        Some(reason) => format!("{status} {reason}"),
        None => format!("HTTP {status}"),
    }
}

fn message_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        // Validation errors often arrive as `["msg", ...]`.
        Value::Array(items) => {
            let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        _ => None,
    }
}

fn looks_like_html(body: &str) -> bool {
    let head = body.trim_start().to_ascii_lowercase();
    head.starts_with("<!doctype") || head.starts_with("<html")
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max).collect();
    format!("{cut}…")
}
