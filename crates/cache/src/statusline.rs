use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::file_cache::FileCache;
use crate::time::now_unix;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatuslineEntry {
    pub agent: String,
    pub decision: String,
    pub tool_name: String,
    pub execution_type: String,
    pub latency_ms: u64,
    pub timestamp: i64,
}

type StatuslineData = Vec<StatuslineEntry>;

/// A bounded, time-pruned ring buffer of recent orchestrator decisions,
/// read only by the (read-only) statusline renderer.
pub struct StatuslineBuffer {
    inner: FileCache<StatuslineData>,
    max_entries: usize,
    ttl_secs: i64,
}

impl StatuslineBuffer {
    pub fn new(path: PathBuf, max_entries: usize, ttl_secs: i64) -> Self {
        Self { inner: FileCache::new(path), max_entries, ttl_secs }
    }

    pub fn set_session(&self, session_id: impl Into<String>) {
        self.inner.set_session(session_id);
    }

    fn prune(&self, data: &mut StatuslineData) {
        let cutoff = now_unix() - self.ttl_secs;
        data.retain(|entry| entry.timestamp >= cutoff);
        if data.len() > self.max_entries {
            let excess = data.len() - self.max_entries;
            data.drain(0..excess);
        }
    }

    /// Append an entry that carries its own timestamp, trimmed to
    /// `max_entries` oldest-first.
    pub fn push(&self, mut entry: StatuslineEntry) -> Result<()> {
        if entry.timestamp == 0 {
            entry.timestamp = now_unix();
        }
        self.inner.update(|data| {
            self.prune(data);
            data.push(entry);
        })
    }

    /// The `n` most recent entries, newest first.
    pub fn recent(&self, n: usize) -> Vec<StatuslineEntry> {
        let mut data = self.inner.load();
        self.prune(&mut data);
        data.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        data.truncate(n);
        data
    }

    pub fn clear(&self) -> Result<()> {
        self.inner.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(agent: &str, timestamp: i64) -> StatuslineEntry {
        StatuslineEntry {
            agent: agent.to_string(),
            decision: "allow".to_string(),
            tool_name: "Edit".to_string(),
            execution_type: "direct".to_string(),
            latency_ms: 120,
            timestamp,
        }
    }

    #[test]
    fn recent_returns_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = StatuslineBuffer::new(dir.path().join("statusline.json"), 50, 600);
        buffer.push(entry("tool-approve", 100)).unwrap();
        buffer.push(entry("error-acknowledge", 200)).unwrap();

        let recent = buffer.recent(10);
        assert_eq!(recent[0].agent, "error-acknowledge");
        assert_eq!(recent[1].agent, "tool-approve");
    }

    #[test]
    fn max_entries_trims_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = StatuslineBuffer::new(dir.path().join("statusline.json"), 2, 600);
        buffer.push(entry("a", 100)).unwrap();
        buffer.push(entry("b", 200)).unwrap();
        buffer.push(entry("c", 300)).unwrap();

        let recent = buffer.recent(10);
        assert_eq!(recent.len(), 2);
        assert!(recent.iter().all(|e| e.agent != "a"));
    }

    #[test]
    fn expired_entries_are_pruned_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = StatuslineBuffer::new(dir.path().join("statusline.json"), 50, 0);
        buffer.push(entry("stale", now_unix() - 1000)).unwrap();
        assert!(buffer.recent(10).is_empty());
    }
}
