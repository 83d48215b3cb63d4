//! Transient notifications.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use exportdesk_core::{ExportError, ExportJob, JobStatus, TaskId};
use exportdesk_events::{NotificationBridge, Subscription};

/// Toasts beyond this many undrained ones push out the oldest.
const MAX_PENDING: usize = 20;

/// Task ids remembered for de-duplicating terminal toasts, oldest forgotten first.
const MAX_ANNOUNCED: usize = 256;

/// Event payload for a toast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Toast {
    ExportSubmitted { task_id: TaskId },
    ExportReady { task_id: TaskId, file_name: String },
    ExportFailed { task_id: TaskId },
    Error { message: String },
}

impl Toast {
    pub fn text(&self) -> String {
        match self {
            Toast::ExportSubmitted { .. } => "Export started, we'll let you know when it's ready".to_string(),
            Toast::ExportReady { file_name, .. } => format!("Export ready: {file_name}"),
            Toast::ExportFailed { .. } => "Export failed, please try again".to_string(),
            Toast::Error { message } => message.clone(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Toast::ExportFailed { .. } | Toast::Error { .. })
    }

    /// The toast for a job snapshot, if it warrants one.
    pub fn for_job(job: &ExportJob) -> Option<Self> {
        match job.status {
            JobStatus::Success => Some(Toast::ExportReady {
                task_id: job.task_id.clone(),
                file_name: job
                    .file_name
                    .clone()
                    .unwrap_or_else(|| format!("export.{}", job.format.generated_extension())),
            }),
            JobStatus::Failure => Some(Toast::ExportFailed {
                task_id: job.task_id.clone(),
            }),
            JobStatus::Pending | JobStatus::Started => None,
        }
    }
}

impl From<&ExportError> for Toast {
    fn from(err: &ExportError) -> Self {
        Toast::Error {
            message: err.user_message(),
        }
    }
}

#[derive(Debug, Default)]
struct FeedState {
    pending: VecDeque<Toast>,
    announced: HashSet<TaskId>,
    announced_order: VecDeque<TaskId>,
}

impl FeedState {
    /// Returns `false` if the job was already announced.
    fn announce(&mut self, task_id: &TaskId) -> bool {
        if !self.announced.insert(task_id.clone()) {
            return false;
        }
        self.announced_order.push_back(task_id.clone());
        if self.announced_order.len() > MAX_ANNOUNCED {
            if let Some(oldest) = self.announced_order.pop_front() {
                self.announced.remove(&oldest);
            }
        }
        true
    }

    fn push(&mut self, toast: Toast) {
        if self.pending.len() == MAX_PENDING {
            self.pending.pop_front();
        }
        self.pending.push_back(toast);
    }
}

/// Queue of toasts for the UI to drain.
///
/// Terminal job snapshots arrive through the bridge; each job is announced at
/// most once.
pub struct ToastFeed {
    state: Arc<Mutex<FeedState>>,
    subscription: Option<Subscription>,
}

impl ToastFeed {
    pub fn attach(bridge: &NotificationBridge<ExportJob>) -> Self {
        let state = Arc::new(Mutex::new(FeedState::default()));
        let sink = Arc::clone(&state);
        let subscription = bridge.subscribe(move |job: &ExportJob| {
            let Some(toast) = Toast::for_job(job) else {
                return;
            };
            let mut state = sink.lock().unwrap_or_else(PoisonError::into_inner);
            if state.announce(&job.task_id) {
                state.push(toast);
            }
        });

        Self {
            state,
            subscription: Some(subscription),
        }
    }

    pub fn push(&self, toast: Toast) {
        tracing::debug!(toast = ?toast, "toast queued");
        self.state().push(toast);
    }

    /// Take every queued toast, oldest first.
    pub fn drain(&self) -> Vec<Toast> {
        self.state().pending.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.state().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop receiving job snapshots. Already queued toasts stay drainable.
    pub fn detach(&mut self) -> bool {
        self.subscription.take().is_some_and(Subscription::unsubscribe)
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl core::fmt::Debug for ToastFeed {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ToastFeed")
            .field("pending", &self.len())
            .field("attached", &self.subscription.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exportdesk_core::ExportFormat;

    fn done(id: &str) -> ExportJob {
        ExportJob::completed(TaskId::new(id), ExportFormat::Csv, format!("/exports/{id}.csv"), format!("{id}.csv"))
    }

    #[test]
    fn one_toast_per_terminal_job() {
        let bridge = NotificationBridge::new();
        let feed = ToastFeed::attach(&bridge);

        let mut running = ExportJob::pending(TaskId::new("t-1"), ExportFormat::Pdf);
        bridge.publish(&running);
        running.status = JobStatus::Started;
        bridge.publish(&running);
        assert!(feed.is_empty());

        bridge.publish(&done("t-2"));
        bridge.publish(&done("t-2"));

        let mut failed = ExportJob::pending(TaskId::new("t-3"), ExportFormat::Csv);
        failed.mark_failed("timed out");
        bridge.publish(&failed);

        let toasts = feed.drain();
        assert_eq!(
            toasts,
            vec![
                Toast::ExportReady {
                    task_id: TaskId::new("t-2"),
                    file_name: "t-2.csv".into()
                },
                Toast::ExportFailed {
                    task_id: TaskId::new("t-3")
                },
            ]
        );
        assert_eq!(toasts[1].text(), "Export failed, please try again");
        assert!(feed.drain().is_empty());
    }

    #[test]
    fn announced_ids_are_bounded() {
        let bridge = NotificationBridge::new();
        let feed = ToastFeed::attach(&bridge);
        for i in 0..MAX_ANNOUNCED + 40 {
            bridge.publish(&done(&format!("t-{i}")));
            feed.drain();
        }

        let state = feed.state();
        assert_eq!(state.announced.len(), MAX_ANNOUNCED);
        assert_eq!(state.announced_order.len(), MAX_ANNOUNCED);
        assert!(!state.announced.contains(&TaskId::new("t-0")));
        assert!(state.announced.contains(&TaskId::new(format!("t-{}", MAX_ANNOUNCED + 39))));
    }

    #[test]
    fn recent_duplicates_are_still_suppressed_after_eviction() {
        let bridge = NotificationBridge::new();
        let feed = ToastFeed::attach(&bridge);
        for i in 0..MAX_ANNOUNCED + 1 {
            bridge.publish(&done(&format!("t-{i}")));
        }
        feed.drain();

        bridge.publish(&done(&format!("t-{MAX_ANNOUNCED}")));
        assert!(feed.is_empty());
    }

    #[test]
    fn oldest_toasts_are_dropped_when_full() {
        let bridge = NotificationBridge::new();
        let feed = ToastFeed::attach(&bridge);
        for i in 0..MAX_PENDING + 3 {
            feed.push(Toast::Error { message: i.to_string() });
        }
        let toasts = feed.drain();
        assert_eq!(toasts.len(), MAX_PENDING);
        assert_eq!(toasts[0], Toast::Error { message: "3".into() });
    }

    #[test]
    fn detached_feed_ignores_new_jobs() {
        let bridge = NotificationBridge::new();
        let mut feed = ToastFeed::attach(&bridge);
        assert!(feed.detach());
        assert!(!feed.detach());
        bridge.publish(&done("t-9"));
        assert!(feed.is_empty());
        assert_eq!(bridge.subscriber_count(), 0);
    }

    #[test]
    fn errors_render_their_user_message() {
        let toast = Toast::from(&ExportError::submission("Account 7 is archived"));
        assert!(toast.is_error());
        assert_eq!(toast.text(), "Account 7 is archived");
    }
}
