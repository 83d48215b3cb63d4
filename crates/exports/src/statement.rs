//! Page layout of the PDF statement, kept free of any PDF types.

use chrono::{DateTime, Local};
use rust_decimal::Decimal;

use exportdesk_core::{EntryKind, ExportQuery, Transaction, TransactionSummary};

/// Lines the summary block needs at the bottom of the last page.
pub const SUMMARY_LINES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementRow {
    pub date: String,
    pub account: String,
    pub kind: String,
    pub purpose: String,
    pub credit: Option<Decimal>,
    pub debit: Option<Decimal>,
    /// Running balance after this row.
    pub balance: Decimal,
}

/// Rows sorted oldest first with a running balance, split into pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementLayout {
    pub title: String,
    pub generated_at: DateTime<Local>,
    /// `key: value` pairs of the applied filters, if any.
    pub filter_line: Option<String>,
    pub pages: Vec<Vec<StatementRow>>,
    pub summary: TransactionSummary,
    pub closing_balance: Decimal,
}

impl StatementLayout {
    pub fn build(
        rows: &[Transaction],
        summary: TransactionSummary,
        query: &ExportQuery,
        rows_per_page: usize,
        generated_at: DateTime<Local>,
    ) -> Self {
        let rows_per_page = rows_per_page.max(SUMMARY_LINES + 1);

        let mut ordered: Vec<&Transaction> = rows.iter().collect();
        // Stable: rows without a parseable time keep their relative order, last.
        ordered.sort_by_key(|tx| {
            let at = tx.occurred_at();
            (at.is_none(), at)
        });

        let mut balance = Decimal::ZERO;
        let statement_rows: Vec<StatementRow> = ordered
            .into_iter()
            .map(|tx| {
                let (credit, debit) = match tx.kind() {
                    Some(EntryKind::Credit) => {
                        balance += tx.amount;
                        (Some(tx.amount), None)
                    }
                    Some(EntryKind::Debit) => {
                        balance -= tx.amount;
                        (None, Some(tx.amount))
                    }
                    None => (None, None),
                };
                StatementRow {
                    date: tx.display_time(),
                    account: tx.account.clone(),
                    kind: tx.transaction_type.clone(),
                    purpose: tx.purpose.clone(),
                    credit,
                    debit,
                    balance,
                }
            })
            .collect();

        let mut pages: Vec<Vec<StatementRow>> = statement_rows
            .chunks(rows_per_page)
            .map(<[StatementRow]>::to_vec)
            .collect();

        // The summary goes below the last page's rows; start a new page if it does not fit.
        let last_fits = pages
            .last()
            .is_some_and(|last| last.len() + SUMMARY_LINES <= rows_per_page);
        if !last_fits {
            pages.push(Vec::new());
        }

        let filter_line = query.is_filtered().then(|| {
            query
                .pairs()
                .map(|(k, v)| format!("{k}: {v}"))
                .collect::<Vec<_>>()
                .join("   ")
        });

        Self {
            title: "Transaction Statement".to_string(),
            generated_at,
            filter_line,
            pages,
            summary,
            closing_balance: balance,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn row_count(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exportdesk_core::ExportFormat;

    fn tx(time: &str, ty: &str, amount: i64) -> Transaction {
        Transaction {
            id: time.into(),
            time: time.into(),
            account: "Main".into(),
            transaction_type: ty.into(),
            amount: Decimal::new(amount, 0),
            purpose: String::new(),
        }
    }

    fn layout(rows: &[Transaction], per_page: usize) -> StatementLayout {
        StatementLayout::build(
            rows,
            TransactionSummary::from_rows(rows),
            &ExportQuery::new(ExportFormat::Pdf),
            per_page,
            Local::now(),
        )
    }

    #[test]
    fn rows_are_oldest_first_with_running_balance() {
        // Newest first, as the list endpoint returns them.
        let rows = vec![
            tx("2024-01-03", "Debit", 30),
            tx("2024-01-02", "Credit", 100),
            tx("2024-01-01", "Credit", 50),
        ];
        let layout = layout(&rows, 20);
        let page = &layout.pages[0];

        let balances: Vec<Decimal> = page.iter().map(|r| r.balance).collect();
        assert_eq!(balances, vec![Decimal::new(50, 0), Decimal::new(150, 0), Decimal::new(120, 0)]);
        assert_eq!(page[0].date, "2024-01-01 00:00");
        assert_eq!(page[2].debit, Some(Decimal::new(30, 0)));
        assert_eq!(layout.closing_balance, layout.summary.net_amount);
    }

    #[test]
    fn empty_export_still_has_one_page() {
        let layout = layout(&[], 20);
        assert_eq!(layout.page_count(), 1);
        assert_eq!(layout.row_count(), 0);
    }

    #[test]
    fn summary_gets_its_own_page_when_last_page_is_full() {
        let rows: Vec<Transaction> = (1..=20)
            .map(|d| tx(&format!("2024-01-{d:02}"), "Credit", 1))
            .collect();

        let tight = layout(&rows, 10);
        assert_eq!(tight.page_count(), 3);
        assert!(tight.pages[2].is_empty());

        let roomy = layout(&rows, 25);
        assert_eq!(roomy.page_count(), 1);
        assert_eq!(roomy.row_count(), 20);
    }

    #[test]
    fn filter_line_lists_applied_filters() {
        let mut query = ExportQuery::new(ExportFormat::Pdf);
        query.filters.insert("account_id".into(), "7".into());
        query.filters.insert("from_date".into(), "2024-01-01".into());
        let layout =
            StatementLayout::build(&[], TransactionSummary::default(), &query, 20, Local::now());
        assert_eq!(layout.filter_line.as_deref(), Some("account_id: 7   from_date: 2024-01-01"));
    }
}
