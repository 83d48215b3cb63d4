//! Strongly-typed identifiers used across the export subsystem.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ExportError;

/// Prefix of task ids synthesized locally for synchronous completions.
pub const SYNTHETIC_PREFIX: &str = "sync-";

/// Identifier of one export job.
///
/// Backend-issued ids are opaque strings; jobs that completed without the task
/// queue get a locally synthesized id (see [`TaskId::synthetic`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create a placeholder id for a job that finished synchronously.
    ///
    /// Uses UUIDv7 so synthesized ids sort by creation time.
    pub fn synthetic() -> Self {
        Self(format!("{SYNTHETIC_PREFIX}{}", Uuid::now_v7()))
    }

    pub fn is_synthetic(&self) -> bool {
        self.0.starts_with(SYNTHETIC_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for TaskId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl FromStr for TaskId {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ExportError::invalid_request("task id must not be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_ids_are_prefixed_and_unique() {
        let a = TaskId::synthetic();
        let b = TaskId::synthetic();
        assert!(a.is_synthetic());
        assert!(a.as_str().starts_with("sync-"));
        assert_ne!(a, b);
    }

    #[test]
    fn backend_ids_are_not_synthetic() {
        let id: TaskId = "t-1".parse().unwrap();
        assert!(!id.is_synthetic());
        assert_eq!(id.to_string(), "t-1");
    }

    #[test]
    fn empty_id_is_rejected() {
        assert!("   ".parse::<TaskId>().is_err());
    }
}
