//! Export error model.

use thiserror::Error;

use crate::id::TaskId;

/// Result type used across the export subsystem.
pub type ExportResult<T> = Result<T, ExportError>;

/// Export-level error.
///
/// Network and backend failures are converted into one of these variants at the
/// operation boundary (submit, poll); raw transport errors never leak upward.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExportError {
    /// Both the primary submission and the local fallback failed.
    #[error("export submission failed: {message}")]
    Submission { message: String },

    /// A single status poll failed; retried on the next tick.
    #[error("status poll for {task_id} failed: {message}")]
    PollTransient { task_id: TaskId, message: String },

    /// The backend (or the local timeout) reported a terminal failure.
    #[error("export {task_id} failed: {reason}")]
    JobFailed { task_id: TaskId, reason: String },

    /// Building the CSV/PDF file locally failed. No partial file is produced.
    #[error("file generation failed: {0}")]
    FileGeneration(String),

    /// The request was rejected before any network call.
    #[error("invalid export request: {0}")]
    InvalidRequest(String),
}

impl ExportError {
    pub fn submission(message: impl Into<String>) -> Self {
        Self::Submission {
            message: message.into(),
        }
    }

    pub fn poll_transient(task_id: TaskId, message: impl Into<String>) -> Self {
        Self::PollTransient {
            task_id,
            message: message.into(),
        }
    }

    pub fn job_failed(task_id: TaskId, reason: impl Into<String>) -> Self {
        Self::JobFailed {
            task_id,
            reason: reason.into(),
        }
    }

    pub fn file_generation(msg: impl Into<String>) -> Self {
        Self::FileGeneration(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Short text suitable for a toast notification.
    pub fn user_message(&self) -> String {
        match self {
            ExportError::Submission { message } => message.clone(),
            ExportError::PollTransient { .. } => {
                "Lost contact with the export service, still retrying".to_string()
            }
            ExportError::JobFailed { .. } => "Export failed, please try again".to_string(),
            ExportError::FileGeneration(_) => "Could not generate the export file".to_string(),
            ExportError::InvalidRequest(msg) => msg.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_message_is_shown_verbatim() {
        let err = ExportError::submission("Account 7 is archived");
        assert_eq!(err.user_message(), "Account 7 is archived");
        assert_eq!(err.to_string(), "export submission failed: Account 7 is archived");
    }

    #[test]
    fn job_failure_uses_generic_retry_text() {
        let err = ExportError::job_failed(TaskId::new("t-9"), "worker crashed");
        assert_eq!(err.user_message(), "Export failed, please try again");
        assert!(err.to_string().contains("t-9"));
    }
}
