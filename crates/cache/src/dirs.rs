use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::hash::content_hash;

static CACHE_ROOT: OnceLock<PathBuf> = OnceLock::new();

/// The process-wide cache directory root, `<tmp>/gatekeeper`. Created on
/// first use; a process-lifetime singleton per spec.md §9's "global
/// singletons" design note — there is no need to share it across threads
/// since the pipeline is strictly serial within one hook invocation.
pub fn cache_root() -> &'static Path {
    CACHE_ROOT.get_or_init(|| std::env::temp_dir().join("gatekeeper")).as_path()
}

/// Override the cache root (used by tests and by `CacheSection::root_override`).
pub fn cache_root_override(root: PathBuf) -> PathBuf {
    root
}

/// Resolve the on-disk path for one named cache file within a session's
/// directory. Session identity is the transcript path compared only for
/// string equality — per spec.md §9's open-question resolution, never
/// parsed for meaning beyond a stable directory name.
pub fn cache_file_path(root: &Path, session_id: &str, cache_name: &str) -> PathBuf {
    root.join(content_hash(session_id)).join(format!("{cache_name}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_session_id_resolves_to_same_path() {
        let root = PathBuf::from("/tmp/gatekeeper-test");
        let a = cache_file_path(&root, "/path/to/transcript.jsonl", "rewind");
        let b = cache_file_path(&root, "/path/to/transcript.jsonl", "rewind");
        assert_eq!(a, b);
    }

    #[test]
    fn different_sessions_resolve_to_different_directories() {
        let root = PathBuf::from("/tmp/gatekeeper-test");
        let a = cache_file_path(&root, "/path/one.jsonl", "rewind");
        let b = cache_file_path(&root, "/path/two.jsonl", "rewind");
        assert_ne!(a.parent(), b.parent());
    }
}
