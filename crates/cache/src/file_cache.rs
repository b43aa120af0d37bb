use std::fs;
use std::io::Write as _;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::RwLock;

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::hash::content_hash;

/// The envelope every cache file wraps its payload in. `session_id` and
/// `last_user_message_hash` are the two invalidation keys every cache
/// shares; `data` is cache-specific.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "D: Serialize + DeserializeOwned")]
pub struct Envelope<D> {
    pub session_id: Option<String>,
    pub last_user_message_hash: Option<String>,
    pub data: D,
}

impl<D: Default> Default for Envelope<D> {
    fn default() -> Self {
        Self { session_id: None, last_user_message_hash: None, data: D::default() }
    }
}

/// One file-backed cache. Reads are tolerant of a missing or corrupt file
/// (return the default); writes go through `temp-file -> fsync -> rename`
/// and propagate any I/O error, since a lost write (unlike a lost read) is
/// a real correctness problem for the denial/rewind caches.
pub struct FileCache<D> {
    path: PathBuf,
    session_id: RwLock<Option<String>>,
    _marker: PhantomData<D>,
}

impl<D> FileCache<D>
where
    D: Default + Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf) -> Self {
        Self { path, session_id: RwLock::new(None), _marker: PhantomData }
    }

    pub fn set_session(&self, session_id: impl Into<String>) {
        *self.session_id.write().expect("cache session lock poisoned") = Some(session_id.into());
    }

    /// Load the envelope, applying the session-ID invalidation rule: if the
    /// envelope recorded a session and it doesn't match the one currently
    /// set, `data` is discarded and replaced with the default.
    pub fn load_envelope(&self) -> Envelope<D> {
        let Ok(raw) = fs::read_to_string(&self.path) else {
            return Envelope::default();
        };
        let Ok(envelope) = serde_json::from_str::<Envelope<D>>(&raw) else {
            return Envelope::default();
        };

        let current = self.session_id.read().expect("cache session lock poisoned").clone();
        match (&envelope.session_id, &current) {
            (Some(stored), Some(now)) if stored != now => Envelope { session_id: current, ..Envelope::default() },
            _ => envelope,
        }
    }

    pub fn load(&self) -> D {
        self.load_envelope().data
    }

    pub fn save(&self, data: D) -> Result<()> {
        let envelope = Envelope {
            session_id: self.session_id.read().expect("cache session lock poisoned").clone(),
            last_user_message_hash: self.load_envelope().last_user_message_hash,
            data,
        };
        self.write_envelope(&envelope)
    }

    /// Atomic load-modify-save. This, and `check_user_message`, are the only
    /// ways call sites mutate cache data, so every mutation goes through the
    /// same rename-safe path.
    pub fn update<F: FnOnce(&mut D)>(&self, f: F) -> Result<()> {
        let mut envelope = self.load_envelope();
        f(&mut envelope.data);
        envelope.session_id = self.session_id.read().expect("cache session lock poisoned").clone();
        self.write_envelope(&envelope)
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    /// Compare `text`'s hash against the stored `last_user_message_hash`;
    /// if they differ, clear `data` and record the new hash. Returns
    /// whether a clear happened.
    pub fn check_user_message(&self, text: &str) -> Result<bool> {
        let hash = content_hash(text);
        let mut envelope = self.load_envelope();
        if envelope.last_user_message_hash.as_deref() == Some(hash.as_str()) {
            return Ok(false);
        }
        envelope.data = D::default();
        envelope.last_user_message_hash = Some(hash);
        envelope.session_id = self.session_id.read().expect("cache session lock poisoned").clone();
        self.write_envelope(&envelope)?;
        Ok(true)
    }

    fn write_envelope(&self, envelope: &Envelope<D>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        let rendered = serde_json::to_string(envelope)?;

        let write_result: Result<()> = (|| {
            let mut file = fs::OpenOptions::new().create(true).write(true).truncate(true).open(&tmp_path)?;
            file.write_all(rendered.as_bytes())?;
            file.flush()?;
            file.sync_all()?;
            Ok(())
        })();

        if let Err(err) = write_result {
            let _ = fs::remove_file(&tmp_path);
            return Err(err);
        }

        if let Err(err) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(err.into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(dir: &tempfile::TempDir) -> FileCache<Vec<String>> {
        FileCache::new(dir.path().join("test.json"))
    }

    #[test]
    fn load_on_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir);
        assert_eq!(cache.load(), Vec::<String>::new());
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir);
        cache.set_session("session-a");
        cache.save(vec!["x".to_string()]).unwrap();
        assert_eq!(cache.load(), vec!["x".to_string()]);
    }

    #[test]
    fn session_mismatch_discards_data() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir);
        cache.set_session("session-a");
        cache.save(vec!["x".to_string()]).unwrap();

        cache.set_session("session-b");
        assert_eq!(cache.load(), Vec::<String>::new());
    }

    #[test]
    fn update_is_atomic_load_modify_save() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir);
        cache.set_session("session-a");
        cache.update(|data| data.push("a".to_string())).unwrap();
        cache.update(|data| data.push("b".to_string())).unwrap();
        assert_eq!(cache.load(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn clear_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir);
        cache.save(vec!["x".to_string()]).unwrap();
        cache.clear().unwrap();
        assert_eq!(cache.load(), Vec::<String>::new());
    }

    #[test]
    fn check_user_message_clears_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir);
        cache.update(|data| data.push("a".to_string())).unwrap();

        assert!(!cache.check_user_message("hello").unwrap());
        assert_eq!(cache.load(), vec!["a".to_string()]);

        assert!(cache.check_user_message("different message").unwrap());
        assert_eq!(cache.load(), Vec::<String>::new());

        assert!(!cache.check_user_message("different message").unwrap());
    }

    #[test]
    fn corrupt_file_is_tolerated_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.json");
        fs::write(&path, "not json").unwrap();
        let cache: FileCache<Vec<String>> = FileCache::new(path);
        assert_eq!(cache.load(), Vec::<String>::new());
    }
}
