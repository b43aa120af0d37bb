use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::file_cache::FileCache;
use crate::time::now_unix;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DenialEntry {
    pub count: u32,
    pub timestamp: i64,
}

pub type DenialData = HashMap<String, DenialEntry>;

/// Counts denied tool calls per recognized workaround pattern and escalates
/// the denial reason once a pattern is retried past the configured
/// threshold.
pub struct DenialCache {
    inner: FileCache<DenialData>,
    escalation_threshold: u32,
}

impl DenialCache {
    pub fn new(path: PathBuf, escalation_threshold: u32) -> Self {
        Self { inner: FileCache::new(path), escalation_threshold }
    }

    pub fn set_session(&self, session_id: impl Into<String>) {
        self.inner.set_session(session_id);
    }

    /// Bump the counter for `pattern` and return the new count.
    pub fn record_denial(&self, pattern: &str) -> Result<u32> {
        let mut count = 0;
        self.inner.update(|data| {
            let entry = data.entry(pattern.to_string()).or_default();
            entry.count += 1;
            entry.timestamp = now_unix();
            count = entry.count;
        })?;
        Ok(count)
    }

    /// Prefix `reason` with a "stop retrying" escalation note once the
    /// pattern's count has crossed the threshold; otherwise return it as-is.
    pub fn escalate(&self, pattern: &str, reason: &str) -> String {
        let count = self.inner.load().get(pattern).map(|entry| entry.count).unwrap_or(0);
        if count >= self.escalation_threshold {
            format!(
                "CRITICAL: You have attempted {count} similar workarounds for '{pattern}'. STOP trying alternatives. {reason}"
            )
        } else {
            reason.to_string()
        }
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
    fn counter_increments_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DenialCache::new(dir.path().join("denial.json"), 3);
        assert_eq!(cache.record_denial("build").unwrap(), 1);
        assert_eq!(cache.record_denial("build").unwrap(), 2);
        assert_eq!(cache.record_denial("build").unwrap(), 3);
    }

    #[test]
    fn escalation_triggers_at_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DenialCache::new(dir.path().join("denial.json"), 3);
        cache.record_denial("build").unwrap();
        cache.record_denial("build").unwrap();
        let below = cache.escalate("build", "use the task runner");
        assert!(!below.contains("CRITICAL"));

        cache.record_denial("build").unwrap();
        let at_threshold = cache.escalate("build", "use the task runner");
        assert!(at_threshold.contains("CRITICAL"));
        assert!(at_threshold.contains("attempted 3 similar workarounds for 'build'"));
    }

    #[test]
    fn distinct_patterns_have_independent_counters() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DenialCache::new(dir.path().join("denial.json"), 3);
        cache.record_denial("build").unwrap();
        assert_eq!(cache.record_denial("lint").unwrap(), 1);
    }
}
