//! Client-side tracking of backend export jobs.
//!
//! ## Design
//!
//! - One registry entry and one poll loop per task id
//! - Status only moves forward: `PENDING → STARTED → SUCCESS | FAILURE`
//! - Transient poll failures back off and retry; they never fail a job
//! - Every observed change is published through the notification bridge
//!
//! ## Components
//!
//! - `PollPolicy`: delay between polls after consecutive failures
//! - `TrackerConfig`: poll interval, backoff, maximum tracking duration
//! - `JobTracker`: the registry plus the spawned poll loops

pub mod policy;
pub mod tracker;

pub use policy::{BackoffStrategy, PollPolicy};
pub use tracker::{JobTracker, TrackerConfig};
