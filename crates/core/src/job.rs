//! Export job lifecycle.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ExportError;
use crate::id::TaskId;

/// Output format requested by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Excel,
    Pdf,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Excel => "excel",
            ExportFormat::Pdf => "pdf",
        }
    }

    /// Extension of a file generated locally for this format.
    ///
    /// The Excel variant is a BOM-prefixed CSV, so it keeps the `csv` extension.
    pub fn generated_extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv | ExportFormat::Excel => "csv",
            ExportFormat::Pdf => "pdf",
        }
    }
}

impl core::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "excel" | "xlsx" => Ok(ExportFormat::Excel),
            "pdf" => Ok(ExportFormat::Pdf),
            other => Err(ExportError::invalid_request(format!(
                "unsupported export format '{other}' (expected csv, excel or pdf)"
            ))),
        }
    }
}

/// Job status as reported by the backend task queue.
///
/// `Pending` and `Started` are active; `Success` and `Failure` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Pending,
    Started,
    Success,
    Failure,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Started => "STARTED",
            JobStatus::Success => "SUCCESS",
            JobStatus::Failure => "FAILURE",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failure)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    fn rank(&self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Started => 1,
            JobStatus::Success | JobStatus::Failure => 2,
        }
    }

    /// Whether moving from `self` to `next` respects
    /// `PENDING → STARTED → {SUCCESS, FAILURE}`.
    ///
    /// An active status may repeat (e.g. two `STARTED` polls with new progress).
    /// Nothing leaves a terminal status.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }

    /// Map a raw task-queue state onto the job lifecycle.
    ///
    /// Returns `None` for states this client does not understand.
    pub fn from_backend(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PENDING" | "RECEIVED" => Some(JobStatus::Pending),
            "STARTED" | "PROGRESS" | "RETRY" => Some(JobStatus::Started),
            "SUCCESS" => Some(JobStatus::Success),
            "FAILURE" | "REVOKED" => Some(JobStatus::Failure),
            _ => None,
        }
    }
}

impl core::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress counter reported while a job is `STARTED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub current: u64,
    pub total: u64,
}

impl Progress {
    pub fn new(current: u64, total: u64) -> Self {
        Self { current, total }
    }

    /// Whole percent complete, or `None` when the total is unknown.
    pub fn percent(&self) -> Option<u8> {
        if self.total == 0 {
            return None;
        }
        let pct = u128::from(self.current.min(self.total)) * 100 / u128::from(self.total);
        Some(pct as u8)
    }
}

/// One observation of a job's state, already mapped from the backend shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: JobStatus,
    pub progress: Option<Progress>,
    pub file_path: Option<String>,
    pub error: Option<String>,
}

impl StatusUpdate {
    pub fn new(status: JobStatus) -> Self {
        Self {
            status,
            progress: None,
            file_path: None,
            error: None,
        }
    }
}

/// Lifecycle of one export request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportJob {
    pub task_id: TaskId,
    pub format: ExportFormat,
    pub status: JobStatus,
    /// Only populated while `STARTED`.
    pub progress: Option<Progress>,
    /// Only populated on `SUCCESS`.
    pub file_path: Option<String>,
    /// Only populated on `SUCCESS`.
    pub file_name: Option<String>,
    /// Failure reason on `FAILURE`.
    pub error: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub completed_at: Option<DateTime<Utc>>,
}

const DEFAULT_FAILURE_REASON: &str = "export failed";

impl ExportJob {
    /// A freshly submitted job, waiting for its first poll.
    pub fn pending(task_id: TaskId, format: ExportFormat) -> Self {
        Self {
            task_id,
            format,
            status: JobStatus::Pending,
            progress: None,
            file_path: None,
            file_name: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// A job that completed synchronously (no task queue involved).
    pub fn completed(
        task_id: TaskId,
        format: ExportFormat,
        file_path: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            format,
            status: JobStatus::Success,
            progress: None,
            file_path: Some(file_path.into()),
            file_name: Some(file_name.into()),
            error: None,
            created_at: now,
            completed_at: Some(now),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a status observation.
    ///
    /// Returns `false` (leaving the job untouched) when the update would move
    /// the job backwards or out of a terminal state.
    pub fn apply(&mut self, update: StatusUpdate) -> bool {
        if !self.status.can_transition_to(update.status) {
            return false;
        }

        match update.status {
            JobStatus::Pending => {
                self.status = JobStatus::Pending;
                self.progress = None;
            }
            JobStatus::Started => {
                self.status = JobStatus::Started;
                // Keep the last known progress if this poll carried none.
                if update.progress.is_some() {
                    self.progress = update.progress;
                }
            }
            JobStatus::Success => self.mark_succeeded(update.file_path),
            JobStatus::Failure => {
                self.mark_failed(update.error.unwrap_or_else(|| DEFAULT_FAILURE_REASON.to_string()))
            }
        }
        true
    }

    /// Mark the job as successfully completed.
    pub fn mark_succeeded(&mut self, file_path: Option<String>) {
        self.status = JobStatus::Success;
        self.progress = None;
        self.error = None;
        self.file_name = file_path.as_deref().and_then(file_name_from_path);
        self.file_path = file_path;
        self.completed_at = Some(Utc::now());
    }

    /// Mark the job as failed with a human-readable reason.
    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.status = JobStatus::Failure;
        self.progress = None;
        self.file_path = None;
        self.file_name = None;
        self.error = Some(reason.into());
        self.completed_at = Some(Utc::now());
    }
}

/// Final path segment of a server path or URL (`/exports/t-1.csv` → `t-1.csv`).
pub fn file_name_from_path(path: &str) -> Option<String> {
    let without_query = path.split(['?', '#']).next().unwrap_or(path);
    without_query
        .trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> ExportJob {
        ExportJob::pending(TaskId::new("t-1"), ExportFormat::Csv)
    }

    #[test]
    fn transitions_follow_lifecycle_order() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Started));
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Success));
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Pending));
        assert!(JobStatus::Started.can_transition_to(JobStatus::Started));
        assert!(JobStatus::Started.can_transition_to(JobStatus::Failure));
        assert!(!JobStatus::Started.can_transition_to(JobStatus::Pending));
        assert!(!JobStatus::Success.can_transition_to(JobStatus::Started));
        assert!(!JobStatus::Failure.can_transition_to(JobStatus::Failure));
    }

    #[test]
    fn backend_states_are_mapped() {
        assert_eq!(JobStatus::from_backend("PENDING"), Some(JobStatus::Pending));
        assert_eq!(JobStatus::from_backend("progress"), Some(JobStatus::Started));
        assert_eq!(JobStatus::from_backend("REVOKED"), Some(JobStatus::Failure));
        assert_eq!(JobStatus::from_backend("SUCCESS"), Some(JobStatus::Success));
        assert_eq!(JobStatus::from_backend("WEIRD"), None);
    }

    #[test]
    fn success_populates_file_name() {
        let mut job = job();
        let mut update = StatusUpdate::new(JobStatus::Success);
        update.file_path = Some("/exports/t-1.csv".to_string());

        assert!(job.apply(update));
        assert_eq!(job.status, JobStatus::Success);
        assert_eq!(job.file_name.as_deref(), Some("t-1.csv"));
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn progress_only_lives_while_started() {
        let mut job = job();
        let mut started = StatusUpdate::new(JobStatus::Started);
        started.progress = Some(Progress::new(3, 10));
        assert!(job.apply(started));
        assert_eq!(job.progress, Some(Progress::new(3, 10)));

        assert!(job.apply(StatusUpdate::new(JobStatus::Started)));
        assert_eq!(job.progress, Some(Progress::new(3, 10)));

        assert!(job.apply(StatusUpdate::new(JobStatus::Failure)));
        assert_eq!(job.progress, None);
        assert_eq!(job.error.as_deref(), Some("export failed"));
    }

    #[test]
    fn terminal_jobs_reject_further_updates() {
        let mut job = job();
        assert!(job.apply(StatusUpdate::new(JobStatus::Success)));
        let before = job.clone();
        assert!(!job.apply(StatusUpdate::new(JobStatus::Started)));
        assert_eq!(job, before);
    }

    #[test]
    fn regressions_are_ignored() {
        let mut job = job();
        assert!(job.apply(StatusUpdate::new(JobStatus::Started)));
        assert!(!job.apply(StatusUpdate::new(JobStatus::Pending)));
        assert_eq!(job.status, JobStatus::Started);
    }

    #[test]
    fn file_name_handles_urls_and_trailing_slashes() {
        assert_eq!(file_name_from_path("/exports/a.pdf"), Some("a.pdf".into()));
        assert_eq!(
            file_name_from_path("https://cdn.example.com/x/report.csv?sig=1"),
            Some("report.csv".into())
        );
        assert_eq!(file_name_from_path("dir/sub/"), Some("sub".into()));
        assert_eq!(file_name_from_path(""), None);
    }

    #[test]
    fn timestamps_serialize_as_epoch_millis() {
        let job = ExportJob::completed(TaskId::new("sync-1"), ExportFormat::Pdf, "/f.pdf", "f.pdf");
        let value = serde_json::to_value(&job).unwrap();
        assert!(value["createdAt"].is_i64());
        assert_eq!(value["status"], "SUCCESS");
        assert_eq!(value["taskId"], "sync-1");
    }

    #[test]
    fn progress_percent() {
        assert_eq!(Progress::new(1, 4).percent(), Some(25));
        assert_eq!(Progress::new(9, 0).percent(), None);
        assert_eq!(Progress::new(12, 10).percent(), Some(100));
    }

    #[test]
    fn progress_percent_handles_huge_counts() {
        assert_eq!(Progress::new(u64::MAX, u64::MAX).percent(), Some(100));
        assert_eq!(Progress::new(u64::MAX / 2, u64::MAX).percent(), Some(49));
        assert_eq!(Progress::new(u64::MAX / 100 + 1, u64::MAX).percent(), Some(1));
    }
}
