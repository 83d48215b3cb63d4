//! Export submission and client-side file generation.
//!
//! Responsibility: turn an [`ExportParams`](exportdesk_core::ExportParams) into
//! either a backend task to track or a finished file. When the backend cannot
//! produce the file itself, rows are fetched page by page and encoded here as
//! CSV or as a PDF statement.

pub mod builder;
pub mod csv_file;
pub mod fetch;
pub mod pdf;
pub mod statement;

pub use builder::{BuilderConfig, ExportFile, ExportRequestBuilder, FileSource, SubmitOutcome, encode, generated_file_name};
pub use csv_file::{CSV_HEADERS, CsvOptions, encode_csv};
pub use fetch::fetch_all_transactions;
pub use pdf::encode_pdf;
pub use statement::{StatementLayout, StatementRow};
