//! File-backed, session-scoped caches for the hook sidecar: rewind
//! detection, denial escalation, pending background-validation results,
//! error acknowledgment, and the statusline ring buffer. Every cache shares
//! the same envelope and atomic-write discipline from [`file_cache`].

mod acknowledgment;
mod denial;
mod dirs;
mod file_cache;
mod hash;
mod pending;
mod rewind;
mod statusline;
mod time;

pub use acknowledgment::{AckEntry, AcknowledgmentCache};
pub use denial::{DenialCache, DenialEntry};
pub use dirs::{cache_file_path, cache_root, cache_root_override};
pub use file_cache::{Envelope, FileCache};
pub use hash::content_hash;
pub use pending::{PendingValidation, PendingValidationCache, ValidationStatus};
pub use rewind::{RewindCache, RewindEntry};
pub use statusline::{StatuslineBuffer, StatuslineEntry};
pub use time::now_unix;

use std::path::Path;

use anyhow::Result;

/// The full set of caches for one session, bundled so orchestrator code can
/// set the session ID and invalidate everything with one call each.
pub struct SessionCaches {
    pub rewind: RewindCache,
    pub denial: DenialCache,
    pub pending: PendingValidationCache,
    pub acknowledgment: AcknowledgmentCache,
    pub statusline: StatuslineBuffer,
}

impl SessionCaches {
    pub fn new(root: &Path, session_id: &str, config: &SessionCacheConfig) -> Self {
        let caches = Self {
            rewind: RewindCache::new(cache_file_path(root, session_id, "rewind"), config.rewind_max_entries),
            denial: DenialCache::new(cache_file_path(root, session_id, "denial"), config.denial_escalation_threshold),
            pending: PendingValidationCache::new(cache_file_path(root, session_id, "pending")),
            acknowledgment: AcknowledgmentCache::new(
                cache_file_path(root, session_id, "acknowledgment"),
                config.acknowledgment_ttl_secs,
                config.acknowledgment_max_entries,
            ),
            statusline: StatuslineBuffer::new(
                cache_file_path(root, session_id, "statusline"),
                config.statusline_max_entries,
                config.statusline_ttl_secs,
            ),
        };
        caches.set_session(session_id);
        caches
    }

    fn set_session(&self, session_id: &str) {
        self.rewind.set_session(session_id);
        self.denial.set_session(session_id);
        self.pending.set_session(session_id);
        self.acknowledgment.set_session(session_id);
        self.statusline.set_session(session_id);
    }

    /// Clear every cache for this session — called on rewind detection and
    /// on a fresh AskUserQuestion answer.
    pub fn invalidate_all(&self) -> Result<()> {
        self.rewind.clear()?;
        self.denial.clear()?;
        self.pending.clear()?;
        self.acknowledgment.clear()?;
        self.statusline.clear()?;
        Ok(())
    }
}

/// The subset of `gatekeeper_config::CacheSection` / `PipelineSection` the
/// cache layer needs, decoupled from the config crate so this crate has no
/// dependency on it.
pub struct SessionCacheConfig {
    pub acknowledgment_ttl_secs: i64,
    pub acknowledgment_max_entries: usize,
    pub denial_escalation_threshold: u32,
    pub rewind_max_entries: usize,
    pub statusline_max_entries: usize,
    pub statusline_ttl_secs: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SessionCacheConfig {
        SessionCacheConfig {
            acknowledgment_ttl_secs: 3600,
            acknowledgment_max_entries: 50,
            denial_escalation_threshold: 3,
            rewind_max_entries: 100,
            statusline_max_entries: 30,
            statusline_ttl_secs: 600,
        }
    }

    #[test]
    fn invalidate_all_clears_every_cache() {
        let dir = tempfile::tempdir().unwrap();
        let caches = SessionCaches::new(dir.path(), "/tmp/transcript.jsonl", &config());

        caches.rewind.record_user_message("hello", 1).unwrap();
        caches.denial.record_denial("build").unwrap();
        caches
            .pending
            .record(PendingValidation {
                status: ValidationStatus::Passed,
                tool_name: "Edit".to_string(),
                file_path: "src/lib.rs".to_string(),
                failure_reason: None,
            })
            .unwrap();
        caches.acknowledgment.acknowledge("some error").unwrap();
        caches
            .statusline
            .push(StatuslineEntry {
                agent: "tool-approve".to_string(),
                decision: "allow".to_string(),
                tool_name: "Edit".to_string(),
                execution_type: "direct".to_string(),
                latency_ms: 50,
                timestamp: now_unix(),
            })
            .unwrap();

        caches.invalidate_all().unwrap();

        assert!(!caches.rewind.detect_rewind("anything"));
        assert_eq!(caches.denial.escalate("build", "x"), "x");
        assert!(caches.pending.take().unwrap().is_none());
        assert!(!caches.acknowledgment.is_acknowledged("some error"));
        assert!(caches.statusline.recent(10).is_empty());
    }

    #[test]
    fn two_sessions_under_the_same_root_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let a = SessionCaches::new(dir.path(), "session-a", &config());
        let b = SessionCaches::new(dir.path(), "session-b", &config());

        a.rewind.record_user_message("only in a", 1).unwrap();
        assert!(!b.rewind.detect_rewind("unrelated text"));
    }
}
