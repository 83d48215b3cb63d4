//! `exportdesk-desktop`
//!
//! **Responsibility:** application wiring for the export client.
//!
//! This crate provides:
//! - [`ExportCenter`], the one-per-process export service
//! - [`ToastFeed`], transient notifications derived from job snapshots
//! - [`ExportHistory`], the in-app list of recent exports
//!
//! Both UI surfaces subscribe to the same notification bridge, so one poll
//! loop per job feeds all of them.

pub mod center;
pub mod history;
pub mod toast;

pub use center::{CenterSettings, ExportCenter};
pub use history::{DEFAULT_HISTORY_CAPACITY, ExportHistory};
pub use toast::{Toast, ToastFeed};
