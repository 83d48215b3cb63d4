//! Channel-backed subscriptions.
//!
//! A pull-style alternative to callbacks: each subscription owns the receiving
//! half of an unbounded channel and sees every message published after it was
//! created (broadcast semantics).
//!
//! ```ignore
//! let sub = bridge.subscribe_channel();
//! loop {
//!     match sub.recv_timeout(Duration::from_secs(1)) {
//!         Ok(job) => render(job),
//!         Err(RecvTimeoutError::Timeout) => continue,
//!         Err(RecvTimeoutError::Disconnected) => break,
//!     }
//! }
//! ```
//!
//! Dropping the subscription disconnects it; the bridge prunes it on the next publish.

use std::sync::mpsc::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::time::Duration;

#[derive(Debug)]
pub struct ChannelSubscription<M> {
    receiver: Receiver<M>,
}

impl<M> ChannelSubscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything already queued, without blocking.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}
