//! The export service the UI talks to.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use exportdesk_core::{ExportJob, ExportParams, ExportResult, TaskId};
use exportdesk_events::{NotificationBridge, Subscription};
use exportdesk_exports::{BuilderConfig, ExportRequestBuilder, SubmitOutcome};
use exportdesk_infra::{
    ApiConfig, DirectorySink, DownloadSink, ExportApi, HttpBackend, JobTracker, StatusClient, TrackerConfig,
};

use crate::history::{DEFAULT_HISTORY_CAPACITY, ExportHistory};
use crate::toast::{Toast, ToastFeed};

#[derive(Debug, Clone)]
pub struct CenterSettings {
    pub tracker: TrackerConfig,
    pub builder: BuilderConfig,
    pub history_capacity: usize,
}

impl Default for CenterSettings {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            builder: BuilderConfig::default(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl CenterSettings {
    pub fn with_tracker(mut self, tracker: TrackerConfig) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_builder(mut self, builder: BuilderConfig) -> Self {
        self.builder = builder;
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }
}

/// Submits exports and tracks them until they finish.
///
/// Construct once at application start and share it behind an `Arc`. The
/// toast feed and history are the first two bridge subscribers, in that order.
pub struct ExportCenter {
    builder: ExportRequestBuilder,
    tracker: JobTracker,
    toasts: ToastFeed,
    history: ExportHistory,
}

impl ExportCenter {
    pub fn new(
        api: Arc<dyn ExportApi>,
        status: Arc<dyn StatusClient>,
        sink: Arc<dyn DownloadSink>,
        settings: CenterSettings,
    ) -> Self {
        let bridge = NotificationBridge::new();
        let toasts = ToastFeed::attach(&bridge);
        let history = ExportHistory::attach(&bridge, settings.history_capacity);
        let tracker = JobTracker::new(status, bridge, settings.tracker);

        Self {
            builder: ExportRequestBuilder::new(api, sink, settings.builder),
            tracker,
            toasts,
            history,
        }
    }

    /// Wire the reqwest backend and save generated files to the downloads folder.
    pub fn from_config(config: ApiConfig, settings: CenterSettings) -> anyhow::Result<Self> {
        let base_url = config.base_url.clone();
        let backend = Arc::new(
            HttpBackend::new(config).with_context(|| format!("building export client for {base_url}"))?,
        );
        let sink = Arc::new(DirectorySink::downloads());
        info!(base_url = %base_url, downloads = %sink.dir().display(), "export center ready");
        Ok(Self::new(backend.clone(), backend, sink, settings))
    }

    /// Install logging, read `API_BASE_URL`/`API_TOKEN`, and build the center.
    pub fn from_env(settings: CenterSettings) -> anyhow::Result<Self> {
        exportdesk_observability::init();
        Self::from_config(ApiConfig::from_env(), settings)
    }

    /// Submit an export and return the id the job is known by.
    ///
    /// Queued exports are tracked until they finish. Exports that complete
    /// immediately get a synthesized `sync-…` id and are published once as
    /// `SUCCESS`. Failures are returned and also queued as an error toast.
    pub async fn export(&self, params: &ExportParams) -> ExportResult<TaskId> {
        match self.builder.submit(params).await {
            Ok(SubmitOutcome::Async { task_id }) => {
                if self.tracker.track(task_id.clone(), params.format) {
                    self.toasts.push(Toast::ExportSubmitted {
                        task_id: task_id.clone(),
                    });
                } else {
                    warn!(task_id = %task_id, "export already being tracked");
                }
                Ok(task_id)
            }
            Ok(SubmitOutcome::Sync(file)) => {
                let task_id = TaskId::synthetic();
                let job = ExportJob::completed(task_id.clone(), params.format, file.file_path, file.file_name);
                self.tracker.record_completed(job);
                Ok(task_id)
            }
            Err(e) => {
                warn!(error = %e, "export request failed");
                self.toasts.push(Toast::from(&e));
                Err(e)
            }
        }
    }

    /// Additional subscribers (e.g. a download-progress widget) attach here.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ExportJob) + Send + Sync + 'static,
    {
        self.bridge().subscribe(callback)
    }

    pub fn bridge(&self) -> &NotificationBridge<ExportJob> {
        self.tracker.bridge()
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    pub fn untrack(&self, task_id: &TaskId) -> bool {
        self.tracker.untrack(task_id)
    }

    pub fn active_jobs(&self) -> Vec<ExportJob> {
        self.tracker.active_jobs()
    }

    pub fn toasts(&self) -> &ToastFeed {
        &self.toasts
    }

    pub fn history(&self) -> &ExportHistory {
        &self.history
    }

    /// Stop every poll loop. Call on application exit.
    pub fn shutdown(&self) {
        self.tracker.shutdown();
    }
}

impl core::fmt::Debug for ExportCenter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ExportCenter")
            .field("tracker", &self.tracker)
            .field("toasts", &self.toasts)
            .field("history", &self.history)
            .finish()
    }
}
