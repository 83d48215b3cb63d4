//! Fetching the complete row set for client-side generation.

use futures::stream::{self, StreamExt, TryStreamExt};

use exportdesk_core::{ExportQuery, Transaction};
use exportdesk_infra::{BackendError, ExportApi, ListRequest, TransactionPage};

/// Fetch every transaction matching `query`, newest first.
///
/// Page 1 is fetched alone to learn the total. The remaining pages are
/// requested at most `concurrency` at a time and appended in page order.
pub async fn fetch_all_transactions(
    api: &dyn ExportApi,
    query: &ExportQuery,
    page_size: u32,
    concurrency: usize,
) -> Result<Vec<Transaction>, BackendError> {
    let page_size = page_size.max(1);
    let first = api
        .list_transactions(&ListRequest::new(query.clone(), 1, page_size))
        .await?;

    let (total, mut rows) = match first {
        TransactionPage::Complete(rows) => return Ok(rows),
        TransactionPage::Paginated { count, results, .. } => (count, results),
    };

    if rows.is_empty() || total <= rows.len() as u64 {
        return Ok(rows);
    }

    // The server may cap page_size; its first page tells us the real size.
    let effective = rows.len() as u64;
    let pages = u32::try_from(total.div_ceil(effective)).unwrap_or(u32::MAX);
    tracing::debug!(total, pages, concurrency, "fetching remaining transaction pages");

    let rest: Vec<TransactionPage> = stream::iter(2..=pages)
        .map(|page| {
            let request = ListRequest::new(query.clone(), page, page_size);
            async move { api.list_transactions(&request).await }
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    for page in rest {
        rows.extend(page.into_rows());
    }

    if rows.len() as u64 != total {
        tracing::warn!(expected = total, fetched = rows.len(), "row count changed while paging");
    }
    Ok(rows)
}
