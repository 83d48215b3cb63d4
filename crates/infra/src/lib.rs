//! Infrastructure layer: backend client, job tracking, downloads, config.
//!
//! Responsibility: everything that talks to the outside world (HTTP, the
//! filesystem, timers). Domain types come from `exportdesk-core`; fan-out
//! comes from `exportdesk-events`.

pub mod backend;
pub mod config;
pub mod downloads;
pub mod jobs;

pub use backend::{
    BackendError, ExportApi, HttpBackend, ListRequest, StatusClient, StatusResponse, SubmitResponse,
    TransactionPage, backend_message, classify_submit_response,
};
pub use config::ApiConfig;
pub use downloads::{DirectorySink, DownloadSink, MemorySink};
pub use jobs::{BackoffStrategy, JobTracker, PollPolicy, TrackerConfig};
