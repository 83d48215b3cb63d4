//! CSV encoding of a transaction export.
//!
//! Layout:
//!
//! ```text
//! ID,Date,Account,Type,Amount,Purpose
//! <one row per transaction>
//!
//! Summary
//! Total Transactions,<n>
//! Total Credit,<x.xx>
//! Total Debit,<x.xx>
//! Net Amount,<x.xx>
//!
//! Filters                      (only when filters were applied)
//! <key>,<value>
//! ```

use csv::WriterBuilder;

use exportdesk_core::{ExportError, ExportQuery, ExportResult, Transaction, TransactionSummary, format_amount};

pub const CSV_HEADERS: [&str; 6] = ["ID", "Date", "Account", "Type", "Amount", "Purpose"];

/// UTF-8 BOM so Excel detects the encoding.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CsvOptions {
    /// Prefix the file with a UTF-8 BOM (the Excel-compatible variant).
    pub excel_bom: bool,
}

pub fn encode_csv(
    rows: &[Transaction],
    summary: &TransactionSummary,
    query: &ExportQuery,
    options: CsvOptions,
) -> ExportResult<Vec<u8>> {
    let mut buffer = Vec::with_capacity(64 + rows.len() * 64);
    if options.excel_bom {
        buffer.extend_from_slice(UTF8_BOM);
    }

    {
        let mut wtr = WriterBuilder::new().flexible(true).from_writer(&mut buffer);
        wtr.write_record(CSV_HEADERS).map_err(csv_error)?;
        for row in rows {
            let amount = format_amount(row.amount);
            let time = row.display_time();
            wtr.write_record([
                row.id.as_str(),
                time.as_str(),
                row.account.as_str(),
                row.transaction_type.as_str(),
                amount.as_str(),
                row.purpose.as_str(),
            ])
            .map_err(csv_error)?;
        }
        wtr.flush().map_err(|e| ExportError::file_generation(e.to_string()))?;
    }

    buffer.push(b'\n');
    {
        let count = summary.total_count.to_string();
        let credit = format_amount(summary.credit_total);
        let debit = format_amount(summary.debit_total);
        let net = format_amount(summary.net_amount);

        let mut wtr = WriterBuilder::new().flexible(true).from_writer(&mut buffer);
        wtr.write_record(["Summary"]).map_err(csv_error)?;
        wtr.write_record(["Total Transactions", count.as_str()]).map_err(csv_error)?;
        wtr.write_record(["Total Credit", credit.as_str()]).map_err(csv_error)?;
        wtr.write_record(["Total Debit", debit.as_str()]).map_err(csv_error)?;
        wtr.write_record(["Net Amount", net.as_str()]).map_err(csv_error)?;
        wtr.flush().map_err(|e| ExportError::file_generation(e.to_string()))?;
    }

    if query.is_filtered() {
        buffer.push(b'\n');
        let mut wtr = WriterBuilder::new().flexible(true).from_writer(&mut buffer);
        wtr.write_record(["Filters"]).map_err(csv_error)?;
        for (key, value) in query.pairs() {
            wtr.write_record([key, value]).map_err(csv_error)?;
        }
        wtr.flush().map_err(|e| ExportError::file_generation(e.to_string()))?;
    }

    Ok(buffer)
}

fn csv_error(e: csv::Error) -> ExportError {
    ExportError::file_generation(format!("csv: {e}"))
}
