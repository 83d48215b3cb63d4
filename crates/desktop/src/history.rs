//! Recent exports for the in-app history panel.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use exportdesk_core::{ExportJob, TaskId};
use exportdesk_events::{NotificationBridge, Subscription};

pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

#[derive(Debug)]
struct Entries {
    jobs: VecDeque<ExportJob>,
    capacity: usize,
}

impl Entries {
    /// Replace the job's snapshot in place, or insert it as the newest entry.
    fn record(&mut self, job: &ExportJob) {
        if let Some(existing) = self.jobs.iter_mut().find(|j| j.task_id == job.task_id) {
            *existing = job.clone();
            return;
        }
        self.jobs.push_front(job.clone());
        self.jobs.truncate(self.capacity);
    }
}

/// Latest snapshot per task id, newest first.
///
/// Lives only as long as the process; the backend keeps the durable log.
pub struct ExportHistory {
    entries: Arc<Mutex<Entries>>,
    subscription: Option<Subscription>,
}

impl ExportHistory {
    pub fn attach(bridge: &NotificationBridge<ExportJob>, capacity: usize) -> Self {
        let entries = Arc::new(Mutex::new(Entries {
            jobs: VecDeque::new(),
            capacity: capacity.max(1),
        }));
        let sink = Arc::clone(&entries);
        let subscription = bridge.subscribe(move |job: &ExportJob| {
            sink.lock().unwrap_or_else(PoisonError::into_inner).record(job);
        });

        Self {
            entries,
            subscription: Some(subscription),
        }
    }

    pub fn entries(&self) -> Vec<ExportJob> {
        self.lock().jobs.iter().cloned().collect()
    }

    pub fn get(&self, task_id: &TaskId) -> Option<ExportJob> {
        self.lock().jobs.iter().find(|j| &j.task_id == task_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().jobs.clear();
    }

    pub fn detach(&mut self) -> bool {
        self.subscription.take().is_some_and(Subscription::unsubscribe)
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl core::fmt::Debug for ExportHistory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ExportHistory").field("len", &self.len()).finish()
    }
}
