//! Export request parameters and their normalised wire form.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ExportError, ExportResult};
use crate::job::ExportFormat;

/// Query keys owned by the transport layer; filters may not override them.
const RESERVED_KEYS: &[&str] = &["format", "page", "page_size", "ordering"];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Inclusive date range filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> ExportResult<Self> {
        let range = Self { from, to };
        range.validate()?;
        Ok(range)
    }

    fn validate(&self) -> ExportResult<()> {
        if self.from > self.to {
            return Err(ExportError::invalid_request(format!(
                "date range start {} is after its end {}",
                self.from, self.to
            )));
        }
        Ok(())
    }
}

/// What the user asked to export.
///
/// Filter values are kept as entered; [`ExportParams::to_query`] does the cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportParams {
    pub format: ExportFormat,
    #[serde(default)]
    pub entity_filters: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub date_range: Option<DateRange>,
}

impl ExportParams {
    pub fn new(format: ExportFormat) -> Self {
        Self {
            format,
            entity_filters: BTreeMap::new(),
            date_range: None,
        }
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entity_filters.insert(key.into(), Some(value.into()));
        self
    }

    /// Add a filter that may be unset (e.g. an empty select box).
    pub fn filter_opt(mut self, key: impl Into<String>, value: Option<String>) -> Self {
        self.entity_filters.insert(key.into(), value);
        self
    }

    pub fn date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    /// Validate and normalise into the outgoing filter set.
    pub fn to_query(&self) -> ExportResult<ExportQuery> {
        let mut filters = BTreeMap::new();

        for (key, value) in &self.entity_filters {
            let key = key.trim();
            if key.is_empty() {
                return Err(ExportError::invalid_request("filter name must not be empty"));
            }
            if RESERVED_KEYS.contains(&key) {
                return Err(ExportError::invalid_request(format!(
                    "'{key}' cannot be used as a filter"
                )));
            }
            let Some(value) = value.as_deref().map(str::trim) else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            filters.insert(key.to_string(), value.to_string());
        }

        if let Some(range) = &self.date_range {
            range.validate()?;
            filters.insert("from_date".to_string(), range.from.format(DATE_FORMAT).to_string());
            filters.insert("to_date".to_string(), range.to.format(DATE_FORMAT).to_string());
        }

        Ok(ExportQuery {
            format: self.format,
            filters,
        })
    }
}

/// Normalised filters as sent to the backend.
///
/// Serialises flat: `{"format": "csv", "account_id": "7", ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportQuery {
    pub format: ExportFormat,
    #[serde(flatten)]
    pub filters: BTreeMap<String, String>,
}

impl ExportQuery {
    pub fn new(format: ExportFormat) -> Self {
        Self {
            format,
            filters: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.filters.get(key).map(String::as_str)
    }

    /// Whether any filter beyond the format was applied.
    pub fn is_filtered(&self) -> bool {
        !self.filters.is_empty()
    }

    /// Filter pairs only (no `format`), in key order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.filters.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
