//! Export submission with a client-side fallback.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::{info, warn};

use exportdesk_core::{
    ExportError, ExportFormat, ExportParams, ExportQuery, ExportResult, TaskId, Transaction,
    TransactionSummary, file_name_from_path,
};
use exportdesk_infra::{BackendError, DownloadSink, ExportApi, SubmitResponse, classify_submit_response};

use crate::csv_file::{CsvOptions, encode_csv};
use crate::fetch::fetch_all_transactions;
use crate::pdf::{DEFAULT_ROWS_PER_PAGE, encode_pdf};
use crate::statement::StatementLayout;

/// Builder configuration.
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Rows requested per list page during the fallback fetch
    pub page_size: u32,
    /// List pages in flight at once
    pub fetch_concurrency: usize,
    /// Table rows per PDF page
    pub rows_per_page: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            page_size: 500,
            fetch_concurrency: 5,
            rows_per_page: DEFAULT_ROWS_PER_PAGE,
        }
    }
}

impl BuilderConfig {
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_fetch_concurrency(mut self, concurrency: usize) -> Self {
        self.fetch_concurrency = concurrency.max(1);
        self
    }

    pub fn with_rows_per_page(mut self, rows: usize) -> Self {
        self.rows_per_page = rows;
        self
    }
}

/// Who produced a synchronously available file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSource {
    /// The backend generated it and returned its path.
    Backend,
    /// Generated here from fetched rows.
    Generated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub file_path: String,
    pub file_name: String,
    pub source: FileSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Queued on the backend; hand the id to the job tracker.
    Async { task_id: TaskId },
    /// Finished; nothing to track.
    Sync(ExportFile),
}

/// Why the fallback path failed.
enum FallbackError {
    Fetch(BackendError),
    Generate(ExportError),
}

/// Submits exports and falls back to client-side generation when the
/// backend cannot queue or produce the file.
pub struct ExportRequestBuilder {
    api: Arc<dyn ExportApi>,
    sink: Arc<dyn DownloadSink>,
    config: BuilderConfig,
}

impl ExportRequestBuilder {
    pub fn new(api: Arc<dyn ExportApi>, sink: Arc<dyn DownloadSink>, config: BuilderConfig) -> Self {
        Self { api, sink, config }
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Submit an export request.
    ///
    /// Invalid params fail before any network call. A task id means the job
    /// runs on the backend; a file path means it is already done. Anything
    /// else (inline rows, an unknown body, a failed request) triggers the
    /// fallback, which refetches every matching row and encodes the file here.
    pub async fn submit(&self, params: &ExportParams) -> ExportResult<SubmitOutcome> {
        let query = params.to_query()?;
        info!(format = %query.format, filters = query.filters.len(), "submitting export");

        let primary_error = match self.api.submit_export(&query).await {
            Ok(body) => match classify_submit_response(&body) {
                SubmitResponse::Task { task_id } => {
                    info!(task_id = %task_id, "export queued");
                    return Ok(SubmitOutcome::Async { task_id });
                }
                SubmitResponse::File { file_path } => {
                    let file_name = file_name_from_path(&file_path)
                        .unwrap_or_else(|| generated_file_name(query.format, Local::now()));
                    info!(file_path = %file_path, "export generated by backend");
                    return Ok(SubmitOutcome::Sync(ExportFile {
                        file_path,
                        file_name,
                        source: FileSource::Backend,
                    }));
                }
                SubmitResponse::Inline { row_count } => {
                    info!(rows = row_count, "no task queue available; generating locally");
                    None
                }
                SubmitResponse::Unrecognized => {
                    warn!("unrecognized export response; generating locally");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "export submission failed; generating locally");
                Some(e)
            }
        };

        match self.generate_locally(&query).await {
            Ok(file) => Ok(SubmitOutcome::Sync(file)),
            Err(FallbackError::Generate(e)) => {
                warn!(error = %e, "local export generation failed");
                Err(e)
            }
            Err(FallbackError::Fetch(fetch_error)) => {
                let message = primary_error
                    .as_ref()
                    .map(BackendError::message)
                    .unwrap_or_else(|| fetch_error.message())
                    .to_string();
                warn!(
                    primary = ?primary_error,
                    fallback = %fetch_error,
                    "export submission and fallback both failed"
                );
                Err(ExportError::submission(message))
            }
        }
    }

    async fn generate_locally(&self, query: &ExportQuery) -> Result<ExportFile, FallbackError> {
        let rows = fetch_all_transactions(
            self.api.as_ref(),
            query,
            self.config.page_size,
            self.config.fetch_concurrency,
        )
        .await
        .map_err(FallbackError::Fetch)?;

        let summary = TransactionSummary::from_rows(&rows);
        let now = Local::now();
        let bytes = encode(query, &rows, summary, self.config.rows_per_page, now)
            .map_err(FallbackError::Generate)?;

        let file_name = generated_file_name(query.format, now);
        let path = self
            .sink
            .save(&file_name, &bytes)
            .await
            .map_err(FallbackError::Generate)?;

        info!(
            rows = rows.len(),
            net_amount = %summary.net_amount,
            path = %path.display(),
            "export generated locally"
        );

        Ok(ExportFile {
            file_name: saved_name(&path).unwrap_or(file_name),
            file_path: path.display().to_string(),
            source: FileSource::Generated,
        })
    }
}

/// Encode fetched rows in the query's format.
///
/// `excel` produces the BOM-prefixed CSV variant.
pub fn encode(
    query: &ExportQuery,
    rows: &[Transaction],
    summary: TransactionSummary,
    rows_per_page: usize,
    generated_at: DateTime<Local>,
) -> ExportResult<Vec<u8>> {
    match query.format {
        ExportFormat::Csv => encode_csv(rows, &summary, query, CsvOptions { excel_bom: false }),
        ExportFormat::Excel => encode_csv(rows, &summary, query, CsvOptions { excel_bom: true }),
        ExportFormat::Pdf => {
            let layout = StatementLayout::build(rows, summary, query, rows_per_page, generated_at);
            encode_pdf(&layout)
        }
    }
}

/// `transactions_<YYYYMMDD_HHMMSS>.<ext>`
pub fn generated_file_name(format: ExportFormat, at: DateTime<Local>) -> String {
    format!(
        "transactions_{}.{}",
        at.format("%Y%m%d_%H%M%S"),
        format.generated_extension()
    )
}

fn saved_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}
