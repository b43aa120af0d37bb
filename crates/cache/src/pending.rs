use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::file_cache::FileCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Passed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingValidation {
    pub status: ValidationStatus,
    pub tool_name: String,
    pub file_path: String,
    pub failure_reason: Option<String>,
}

type PendingData = Option<PendingValidation>;

/// A single envelope holding the result of the last background validator
/// run. The background process writes it; the next foreground hook reads
/// and clears it, so a failed validation blocks exactly one tool call.
pub struct PendingValidationCache {
    inner: FileCache<PendingData>,
}

impl PendingValidationCache {
    pub fn new(path: PathBuf) -> Self {
        Self { inner: FileCache::new(path) }
    }

    pub fn set_session(&self, session_id: impl Into<String>) {
        self.inner.set_session(session_id);
    }

    pub fn record(&self, validation: PendingValidation) -> Result<()> {
        self.inner.save(Some(validation))
    }

    /// Read the pending result, if any, and clear the cache so a repeated
    /// tool call isn't blocked indefinitely by the same stale result.
    pub fn take(&self) -> Result<Option<PendingValidation>> {
        let data = self.inner.load();
        if data.is_some() {
            self.inner.clear()?;
        }
        Ok(data)
    }

    pub fn check_user_message(&self, text: &str) -> Result<bool> {
        self.inner.check_user_message(text)
    }

    pub fn clear(&self) -> Result<()> {
        self.inner.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_on_empty_cache_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PendingValidationCache::new(dir.path().join("pending.json"));
        assert!(cache.take().unwrap().is_none());
    }

    #[test]
    fn take_consumes_the_pending_result() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PendingValidationCache::new(dir.path().join("pending.json"));
        cache
            .record(PendingValidation {
                status: ValidationStatus::Failed,
                tool_name: "Edit".to_string(),
                file_path: "src/main.rs".to_string(),
                failure_reason: Some("type error".to_string()),
            })
            .unwrap();

        let result = cache.take().unwrap().unwrap();
        assert_eq!(result.status, ValidationStatus::Failed);
        assert_eq!(result.tool_name, "Edit");

        assert!(cache.take().unwrap().is_none());
    }
}
