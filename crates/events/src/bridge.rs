//! Typed observer registry.
//!
//! [`NotificationBridge`] is a pure fan-out layer: it never originates messages and
//! never mutates them. Every `publish` hands the same snapshot to every
//! subscriber, in subscription order.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak, mpsc};

use crate::bus::ChannelSubscription;

type Callback<M> = Arc<dyn Fn(&M) + Send + Sync>;

enum Sink<M> {
    Callback(Callback<M>),
    Channel(mpsc::Sender<M>),
}

impl<M> Clone for Sink<M> {
    fn clone(&self) -> Self {
        match self {
            Sink::Callback(cb) => Sink::Callback(Arc::clone(cb)),
            Sink::Channel(tx) => Sink::Channel(tx.clone()),
        }
    }
}

struct Entry<M> {
    id: u64,
    sink: Sink<M>,
}

struct Registry<M> {
    next_id: AtomicU64,
    entries: Mutex<Vec<Entry<M>>>,
}

impl<M> Registry<M> {
    fn insert(&self, sink: Sink<M>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Entry { id, sink });
        id
    }

    fn snapshot(&self) -> Vec<(u64, Sink<M>)> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|e| (e.id, e.sink.clone()))
            .collect()
    }

    fn remove_all(&self, ids: &[u64]) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|e| !ids.contains(&e.id));
    }
}

/// Type-erased removal, so [`Subscription`] does not carry the message type.
trait Unsubscribe: Send + Sync {
    fn remove(&self, id: u64) -> bool;
}

impl<M: Send + 'static> Unsubscribe for Registry<M> {
    fn remove(&self, id: u64) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|e| e.id != id);
        entries.len() != before
    }
}

/// Handle returned by [`NotificationBridge::subscribe`].
///
/// Dropping the handle does **not** unsubscribe; call [`Subscription::unsubscribe`].
pub struct Subscription {
    id: u64,
    registry: Weak<dyn Unsubscribe>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove exactly the callback this handle was created for.
    ///
    /// Returns `false` if it was already removed or the bridge is gone.
    pub fn unsubscribe(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.remove(self.id),
            None => false,
        }
    }
}

impl core::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Fan-out from one producer to many independent subscribers.
///
/// Cloning yields another handle to the same registry.
pub struct NotificationBridge<M> {
    inner: Arc<Registry<M>>,
}

impl<M> Clone for NotificationBridge<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M> Default for NotificationBridge<M> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Registry {
                next_id: AtomicU64::new(1),
                entries: Mutex::new(Vec::new()),
            }),
        }
    }
}

impl<M> core::fmt::Debug for NotificationBridge<M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NotificationBridge")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl<M> NotificationBridge<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<M> NotificationBridge<M>
where
    M: Clone + Send + 'static,
{
    /// Register a callback invoked once per published message, for every job.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&M) + Send + Sync + 'static,
    {
        let id = self.inner.insert(Sink::Callback(Arc::new(callback)));
        let registry: Weak<dyn Unsubscribe> = Arc::downgrade(&self.inner) as Weak<dyn Unsubscribe>;
        Subscription { id, registry }
    }

    /// Register a channel-backed subscriber.
    pub fn subscribe_channel(&self) -> ChannelSubscription<M> {
        let (tx, rx) = mpsc::channel();
        self.inner.insert(Sink::Channel(tx));
        ChannelSubscription::new(rx)
    }

    /// Deliver `message` to every current subscriber, in subscription order.
    ///
    /// The subscriber list is snapshotted first and no lock is held while
    /// callbacks run, so callbacks may subscribe or unsubscribe. A panicking
    /// callback is logged and skipped. Returns the number of successful deliveries.
    pub fn publish(&self, message: &M) -> usize {
        let mut delivered = 0;
        let mut disconnected = Vec::new();

        for (id, sink) in self.inner.snapshot() {
            match sink {
                Sink::Callback(callback) => {
                    match catch_unwind(AssertUnwindSafe(|| callback(message))) {
                        Ok(()) => delivered += 1,
                        Err(panic) => {
                            tracing::error!(
                                subscriber = id,
                                panic = %panic_message(panic.as_ref()),
                                "notification subscriber panicked"
                            );
                        }
                    }
                }
                Sink::Channel(tx) => {
                    if tx.send(message.clone()).is_ok() {
                        delivered += 1;
                    } else {
                        disconnected.push(id);
                    }
                }
            }
        }

        if !disconnected.is_empty() {
            tracing::debug!(count = disconnected.len(), "pruning disconnected channel subscribers");
            self.inner.remove_all(&disconnected);
        }

        delivered
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
