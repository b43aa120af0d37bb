use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::file_cache::FileCache;
use crate::hash::content_hash;
use crate::time::now_unix;

const SNIPPET_LEN: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckEntry {
    pub error_hash: String,
    pub error_snippet: String,
    pub acknowledged_at: i64,
}

pub type AckData = Vec<AckEntry>;

/// Tracks which error snippets the assistant has already acknowledged so
/// error-acknowledge doesn't re-fire on the same error every tool call.
pub struct AcknowledgmentCache {
    inner: FileCache<AckData>,
    ttl_secs: i64,
    max_entries: usize,
}

impl AcknowledgmentCache {
    pub fn new(path: PathBuf, ttl_secs: i64, max_entries: usize) -> Self {
        Self { inner: FileCache::new(path), ttl_secs, max_entries }
    }

    pub fn set_session(&self, session_id: impl Into<String>) {
        self.inner.set_session(session_id);
    }

    fn prune(&self, data: &mut AckData) {
        let cutoff = now_unix() - self.ttl_secs;
        data.retain(|entry| entry.acknowledged_at >= cutoff);
        if data.len() > self.max_entries {
            let excess = data.len() - self.max_entries;
            data.drain(0..excess);
        }
    }

    pub fn is_acknowledged(&self, error_snippet: &str) -> bool {
        let hash = content_hash(error_snippet);
        let mut data = self.inner.load();
        self.prune(&mut data);
        data.iter().any(|entry| entry.error_hash == hash)
    }

    pub fn acknowledge(&self, error_snippet: &str) -> Result<()> {
        let hash = content_hash(error_snippet);
        self.inner.update(|data| {
            self.prune(data);
            if data.iter().any(|entry| entry.error_hash == hash) {
                return;
            }
            let snippet: String = error_snippet.chars().take(SNIPPET_LEN).collect();
            data.push(AckEntry { error_hash: hash, error_snippet: snippet, acknowledged_at: now_unix() });
        })
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
    fn acknowledging_marks_as_acknowledged() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AcknowledgmentCache::new(dir.path().join("ack.json"), 3600, 50);
        assert!(!cache.is_acknowledged("error TS2322: type mismatch"));
        cache.acknowledge("error TS2322: type mismatch").unwrap();
        assert!(cache.is_acknowledged("error TS2322: type mismatch"));
    }

    #[test]
    fn acknowledging_twice_does_not_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AcknowledgmentCache::new(dir.path().join("ack.json"), 3600, 50);
        cache.acknowledge("same error").unwrap();
        cache.acknowledge("same error").unwrap();
        assert_eq!(cache.inner.load().len(), 1);
    }

    #[test]
    fn expired_entries_are_not_considered_acknowledged() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AcknowledgmentCache::new(dir.path().join("ack.json"), 0, 50);
        cache.acknowledge("stale error").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert!(!cache.is_acknowledged("stale error"));
    }

    #[test]
    fn max_entries_drops_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AcknowledgmentCache::new(dir.path().join("ack.json"), 3600, 1);
        cache.acknowledge("first").unwrap();
        cache.acknowledge("second").unwrap();
        assert!(!cache.is_acknowledged("first"));
        assert!(cache.is_acknowledged("second"));
    }
}
