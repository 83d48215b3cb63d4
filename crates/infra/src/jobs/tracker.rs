//! Active-job registry and per-job poll loops.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use exportdesk_core::{ExportError, ExportFormat, ExportJob, TaskId};
use exportdesk_events::NotificationBridge;

use super::policy::PollPolicy;
use crate::backend::{StatusClient, StatusResponse};

/// Reason recorded on jobs that outlive `max_tracking`.
pub const TIMED_OUT: &str = "timed out";

/// Job tracker configuration.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Delay between successful polls (and before the first one)
    pub poll_interval: Duration,
    /// Spacing of retries after failed polls; never shorter than `poll_interval`
    pub backoff: PollPolicy,
    /// Jobs tracked longer than this are failed locally; `None` polls forever
    pub max_tracking: Option<Duration>,
    /// Consecutive poll failures before a warning is logged
    pub failure_warn_threshold: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(2000),
            backoff: PollPolicy::default(),
            max_tracking: Some(Duration::from_secs(30 * 60)),
            failure_warn_threshold: 5,
        }
    }
}

impl TrackerConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_backoff(mut self, backoff: PollPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_max_tracking(mut self, max: Option<Duration>) -> Self {
        self.max_tracking = max;
        self
    }

    pub fn with_failure_warn_threshold(mut self, threshold: u32) -> Self {
        self.failure_warn_threshold = threshold.max(1);
        self
    }
}

/// Cancellation handle of one poll loop.
#[derive(Debug)]
struct PollHandle(AbortHandle);

impl PollHandle {
    fn cancel(&self) {
        self.0.abort();
    }
}

#[derive(Debug)]
struct TrackedJob {
    job: ExportJob,
    handle: PollHandle,
    /// Distinguishes a re-track of the same id from the loop that preceded it.
    generation: u64,
    tracked_since: Instant,
}

struct TrackerInner {
    status: Arc<dyn StatusClient>,
    bridge: NotificationBridge<ExportJob>,
    config: TrackerConfig,
    registry: Mutex<HashMap<TaskId, TrackedJob>>,
    generations: AtomicU64,
}

enum PollStep {
    Continue,
    Stop,
}

impl TrackerInner {
    fn registry(&self) -> MutexGuard<'_, HashMap<TaskId, TrackedJob>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deadline(&self, task_id: &TaskId, generation: u64) -> Option<Option<Instant>> {
        let registry = self.registry();
        let entry = registry.get(task_id).filter(|e| e.generation == generation)?;
        Some(self.config.max_tracking.map(|max| entry.tracked_since + max))
    }

    /// Apply one status response. Publishes outside the registry lock.
    fn apply_response(&self, task_id: &TaskId, generation: u64, response: &StatusResponse) -> PollStep {
        let Some(update) = response.to_update() else {
            warn!(task_id = %task_id, status = %response.status, "unknown export status; still polling");
            return PollStep::Continue;
        };

        let snapshot = {
            let mut registry = self.registry();
            let Some(entry) = registry.get_mut(task_id).filter(|e| e.generation == generation) else {
                return PollStep::Stop;
            };
            let from = entry.job.status;
            if !entry.job.apply(update) {
                debug!(
                    task_id = %task_id,
                    from = ?from,
                    to = %response.status,
                    "ignoring out-of-order status"
                );
                return PollStep::Continue;
            }
            entry.job.clone()
        };

        self.finish_step(snapshot, generation)
    }

    /// Fail a job locally (e.g. it exceeded `max_tracking`).
    fn force_fail(&self, task_id: &TaskId, generation: u64, reason: &str) -> PollStep {
        let snapshot = {
            let mut registry = self.registry();
            let Some(entry) = registry.get_mut(task_id).filter(|e| e.generation == generation) else {
                return PollStep::Stop;
            };
            entry.job.mark_failed(reason);
            entry.job.clone()
        };
        warn!(task_id = %task_id, reason, "export job failed locally");
        self.finish_step(snapshot, generation)
    }

    fn finish_step(&self, snapshot: ExportJob, generation: u64) -> PollStep {
        self.bridge.publish(&snapshot);

        if !snapshot.is_terminal() {
            debug!(
                task_id = %snapshot.task_id,
                status = %snapshot.status,
                percent = ?snapshot.progress.and_then(|p| p.percent()),
                "export job progressed"
            );
            return PollStep::Continue;
        }

        {
            let mut registry = self.registry();
            if registry
                .get(&snapshot.task_id)
                .is_some_and(|e| e.generation == generation)
            {
                registry.remove(&snapshot.task_id);
            }
        }

        match &snapshot.error {
            Some(reason) => {
                let err = ExportError::job_failed(snapshot.task_id.clone(), reason.clone());
                warn!(task_id = %snapshot.task_id, error = %err, "export job failed");
            }
            None => info!(
                task_id = %snapshot.task_id,
                file_name = ?snapshot.file_name,
                "export job completed"
            ),
        }
        PollStep::Stop
    }
}

impl Drop for TrackerInner {
    fn drop(&mut self) {
        let registry = self.registry.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, entry) in registry.drain() {
            entry.handle.cancel();
        }
    }
}

/// Tracks backend export jobs until they reach a terminal state.
///
/// One instance per process, shared by cloning (all clones see the same
/// registry). Tests create a fresh instance each.
#[derive(Clone)]
pub struct JobTracker {
    inner: Arc<TrackerInner>,
}

impl core::fmt::Debug for JobTracker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("JobTracker")
            .field("active", &self.active_count())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl JobTracker {
    pub fn new(
        status: Arc<dyn StatusClient>,
        bridge: NotificationBridge<ExportJob>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                status,
                bridge,
                config,
                registry: Mutex::new(HashMap::new()),
                generations: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.inner.config
    }

    pub fn bridge(&self) -> &NotificationBridge<ExportJob> {
        &self.inner.bridge
    }

    /// Start tracking a queued export.
    ///
    /// Idempotent: returns `false` without starting a second loop when the id is
    /// already tracked. Registration itself publishes nothing; the first poll
    /// happens one `poll_interval` later. Must be called within a tokio runtime.
    pub fn track(&self, task_id: TaskId, format: ExportFormat) -> bool {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::error!(task_id = %task_id, error = %e, "cannot track export outside a runtime");
                return false;
            }
        };

        let mut registry = self.inner.registry();
        if registry.contains_key(&task_id) {
            debug!(task_id = %task_id, "export job already tracked");
            return false;
        }

        let generation = self.inner.generations.fetch_add(1, Ordering::Relaxed);
        let join = runtime.spawn(poll_loop(
            Arc::downgrade(&self.inner),
            task_id.clone(),
            generation,
        ));

        registry.insert(
            task_id.clone(),
            TrackedJob {
                job: ExportJob::pending(task_id.clone(), format),
                handle: PollHandle(join.abort_handle()),
                generation,
                tracked_since: Instant::now(),
            },
        );

        info!(task_id = %task_id, format = %format, "tracking export job");
        true
    }

    /// Stop polling and forget the job, whatever its status. No-op for unknown ids.
    pub fn untrack(&self, task_id: &TaskId) -> bool {
        let removed = self.inner.registry().remove(task_id);
        match removed {
            Some(entry) => {
                entry.handle.cancel();
                info!(task_id = %task_id, status = ?entry.job.status, "stopped tracking export job");
                true
            }
            None => false,
        }
    }

    /// Publish a job that finished without the task queue. It is never registered.
    pub fn record_completed(&self, job: ExportJob) {
        if !job.is_terminal() {
            warn!(task_id = %job.task_id, status = ?job.status, "ignoring non-terminal completion");
            return;
        }
        info!(task_id = %job.task_id, file_name = ?job.file_name, "export completed synchronously");
        self.inner.bridge.publish(&job);
    }

    pub fn is_tracked(&self, task_id: &TaskId) -> bool {
        self.inner.registry().contains_key(task_id)
    }

    pub fn snapshot(&self, task_id: &TaskId) -> Option<ExportJob> {
        self.inner.registry().get(task_id).map(|e| e.job.clone())
    }

    /// Active jobs, oldest first.
    pub fn active_jobs(&self) -> Vec<ExportJob> {
        let mut jobs: Vec<ExportJob> = self.inner.registry().values().map(|e| e.job.clone()).collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.task_id.cmp(&b.task_id)));
        jobs
    }

    pub fn active_count(&self) -> usize {
        self.inner.registry().len()
    }

    /// Cancel every poll loop and clear the registry. Publishes nothing.
    pub fn shutdown(&self) {
        let drained: Vec<TrackedJob> = self.inner.registry().drain().map(|(_, e)| e).collect();
        for entry in &drained {
            entry.handle.cancel();
        }
        if !drained.is_empty() {
            info!(count = drained.len(), "job tracker shut down");
        }
    }
}

/// Poll one job until it is terminal, untracked, or the tracker is dropped.
async fn poll_loop(inner: Weak<TrackerInner>, task_id: TaskId, generation: u64) {
    let mut consecutive_failures = 0u32;
    let mut delay = match inner.upgrade() {
        Some(tracker) => tracker.config.poll_interval,
        None => return,
    };

    loop {
        let deadline = match inner.upgrade() {
            Some(tracker) => match tracker.deadline(&task_id, generation) {
                Some(deadline) => deadline,
                None => break,
            },
            None => break,
        };

        let wake = Instant::now() + delay;
        let timed_out = match deadline {
            Some(deadline) if deadline <= wake => {
                tokio::time::sleep_until(deadline).await;
                true
            }
            _ => {
                tokio::time::sleep_until(wake).await;
                false
            }
        };

        let Some(tracker) = inner.upgrade() else { break };
        if timed_out {
            tracker.force_fail(&task_id, generation, TIMED_OUT);
            break;
        }

        let config = &tracker.config;
        match tracker.status.export_status(&task_id).await {
            Ok(response) => {
                if consecutive_failures >= config.failure_warn_threshold {
                    info!(task_id = %task_id, failures = consecutive_failures, "export status reachable again");
                }
                consecutive_failures = 0;
                delay = config.poll_interval;

                if let PollStep::Stop = tracker.apply_response(&task_id, generation, &response) {
                    break;
                }
            }
            Err(e) => {
                consecutive_failures = consecutive_failures.saturating_add(1);
                let err = ExportError::poll_transient(task_id.clone(), e.message());
                delay = config
                    .backoff
                    .delay_for_attempt(consecutive_failures)
                    .max(config.poll_interval);

                if consecutive_failures == config.failure_warn_threshold {
                    warn!(
                        task_id = %task_id,
                        failures = consecutive_failures,
                        error = %err,
                        "export status keeps failing; still retrying"
                    );
                } else {
                    debug!(
                        task_id = %task_id,
                        failures = consecutive_failures,
                        retry_in = ?delay,
                        error = %err,
                        "export status poll failed"
                    );
                }
            }
        }
    }

    debug!(task_id = %task_id, "poll loop stopped");
}
