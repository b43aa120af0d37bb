use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::file_cache::FileCache;
use crate::hash::content_hash;
use crate::time::now_unix;

const SNIPPET_LEN: usize = 160;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewindEntry {
    pub hash: String,
    pub snippet: String,
    pub index: u64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RewindData {
    pub entries: Vec<RewindEntry>,
    pub first_response_checked: bool,
    pub checked_by_agent: HashMap<String, HashSet<String>>,
}

/// The authoritative per-session user-message log, plus the per-agent
/// already-checked sets that ride alongside it in the same envelope so a
/// rewind invalidates both together.
pub struct RewindCache {
    inner: FileCache<RewindData>,
    max_entries: usize,
}

impl RewindCache {
    pub fn new(path: PathBuf, max_entries: usize) -> Self {
        Self { inner: FileCache::new(path), max_entries }
    }

    pub fn set_session(&self, session_id: impl Into<String>) {
        self.inner.set_session(session_id);
    }

    fn prune(&self, data: &mut RewindData) {
        if data.entries.len() > self.max_entries {
            let excess = data.entries.len() - self.max_entries;
            data.entries.drain(0..excess);
        }
    }

    /// Hash `text`, de-duplicate by hash, append if new. A genuinely new
    /// message resets `first_response_checked`. Returns whether it was new.
    pub fn record_user_message(&self, text: &str, line_index: u64) -> Result<bool> {
        let hash = content_hash(text);
        let mut appended = false;
        self.inner.update(|data| {
            self.prune(data);
            if data.entries.iter().any(|e| e.hash == hash) {
                return;
            }
            let snippet: String = text.chars().take(SNIPPET_LEN).collect();
            data.entries.push(RewindEntry { hash, snippet, index: line_index, timestamp: now_unix() });
            data.first_response_checked = false;
            appended = true;
        })?;
        Ok(appended)
    }

    /// True if any previously recorded snippet no longer occurs in
    /// `transcript_text` — the host UI let the user rewind the conversation.
    pub fn detect_rewind(&self, transcript_text: &str) -> bool {
        let data = self.inner.load();
        data.entries.iter().any(|entry| !transcript_text.contains(&entry.snippet))
    }

    pub fn mark_message_checked_by_agent(&self, agent: &str, text: &str) -> Result<()> {
        let hash = content_hash(text);
        self.inner.update(|data| {
            data.checked_by_agent.entry(agent.to_string()).or_default().insert(hash);
        })
    }

    pub fn is_message_checked_by_agent(&self, agent: &str, text: &str) -> bool {
        let hash = content_hash(text);
        self.inner
            .load()
            .checked_by_agent
            .get(agent)
            .is_some_and(|hashes| hashes.contains(&hash))
    }

    pub fn first_response_checked(&self) -> bool {
        self.inner.load().first_response_checked
    }

    pub fn set_first_response_checked(&self, value: bool) -> Result<()> {
        self.inner.update(|data| data.first_response_checked = value)
    }

    pub fn check_user_message(&self, text: &str) -> Result<bool> {
        self.inner.check_user_message(text)
    }

    pub fn clear(&self) -> Result<()> {
        self.inner.clear()
    }
}
