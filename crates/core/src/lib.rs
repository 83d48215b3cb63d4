//! `exportdesk-core`: export domain building blocks.
//!
//! This crate contains **pure domain** types (no IO, no async): job identity and
//! lifecycle, the normalised export request, transaction rows and their summary,
//! and the error taxonomy shared by every other crate.

pub mod error;
pub mod id;
pub mod job;
pub mod query;
pub mod transaction;

pub use error::{ExportError, ExportResult};
pub use id::TaskId;
pub use job::{ExportFormat, ExportJob, JobStatus, Progress, StatusUpdate, file_name_from_path};
pub use query::{DateRange, ExportParams, ExportQuery};
pub use transaction::{EntryKind, Transaction, TransactionSummary, format_amount};
