//! Explicit store of open sessions keyed by session id.
//!
//! Each session gets its own interchange document next to the configured
//! one: `ast.json` becomes `<id>.ast.json`.

use std::sync::{Arc, Mutex, MutexGuard};

use dashmap::DashMap;
use tracing::info;

use crate::application::Session;
use crate::config::EngineConfig;
use crate::ports::TextGenerator;

pub type SharedSession = Arc<Mutex<Session>>;

pub struct SessionStore {
    sessions: DashMap<String, SharedSession>,
    config: EngineConfig,
    generator: Arc<dyn TextGenerator>,
}

impl SessionStore {
    pub fn new(config: EngineConfig, generator: Arc<dyn TextGenerator>) -> Self {
        SessionStore {
            sessions: DashMap::new(),
            config,
            generator,
        }
    }

    /// Return the session for `id`, creating it on first use.
    pub fn open(&self, id: &str) -> SharedSession {
        self.sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                info!(session = id, "opening session");
                let session = Session::new(self.session_config(id), Arc::clone(&self.generator));
                Arc::new(Mutex::new(session))
            })
            .clone()
    }

    pub fn get(&self, id: &str) -> Option<SharedSession> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Persist the session's current tree. `false` if unknown or the write failed.
    pub fn flush(&self, id: &str) -> bool {
        match self.get(id) {
            Some(shared) => {
                let session = lock(&shared);
                session.round_trip().persist(session.root())
            }
            None => false,
        }
    }

    /// Flush and forget the session.
    pub fn close(&self, id: &str) -> bool {
        let flushed = self.flush(id);
        let removed = self.sessions.remove(id).is_some();
        if removed {
            info!(session = id, flushed, "closed session");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn session_config(&self, id: &str) -> EngineConfig {
        let mut config = self.config.clone();
        let safe_id = file_safe(id);
        let file_name = config
            .interchange_path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| "ast.json".to_string());
        config.interchange_path = config
            .interchange_path
            .with_file_name(format!("{}.{}", safe_id, file_name));
        config
    }
}

/// Escape every byte outside `[A-Za-z0-9-]` as `_xx`. `_` is escaped too, so
/// distinct ids never share a file name.
fn file_safe(id: &str) -> String {
    let mut safe = String::with_capacity(id.len());
    for c in id.chars() {
        if c.is_ascii_alphanumeric() || c == '-' {
            safe.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                safe.push_str(&format!("_{:02x}", byte));
            }
        }
    }
    safe
}

/// Lock a session, recovering the guard if a previous holder panicked.
pub fn lock(session: &Mutex<Session>) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use tempfile::tempdir;

    struct Silent;
    impl TextGenerator for Silent {
        fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            Err(GenerationError::Unavailable("offline".to_string()))
        }
    }

    fn store(dir: &std::path::Path) -> SessionStore {
        let config = EngineConfig {
            interchange_path: dir.join("ast.json"),
            ..EngineConfig::default()
        };
        SessionStore::new(config, Arc::new(Silent))
    }

    #[test]
    fn test_open_is_idempotent_and_sessions_are_isolated() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        let a = store.open("alpha");
        let again = store.open("alpha");
        assert!(Arc::ptr_eq(&a, &again));

        let b = store.open("beta");
        lock(&a).load_source("fn a() { let x = 1; }");
        lock(&b).load_source("fn b() {}");

        assert_eq!(store.len(), 2);
        assert!(dir.path().join("alpha.ast.json").exists());
        assert!(dir.path().join("beta.ast.json").exists());
        assert_ne!(lock(&a).root().count(), lock(&b).root().count());
    }

    #[test]
    fn test_close_flushes_and_removes() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        store.open("doc/1");
        assert!(store.close("doc/1"));
        assert!(dir.path().join("doc_2f1.ast.json").exists());
        assert!(store.get("doc/1").is_none());
        assert!(!store.close("doc/1"));
    }

    #[test]
    fn test_escaped_ids_do_not_collide() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        lock(&store.open("doc/1")).load_source("fn slash() {}");
        lock(&store.open("doc_1")).load_source("fn underscore() { let u = 1; }");

        let slash = std::fs::read_to_string(dir.path().join("doc_2f1.ast.json")).unwrap();
        let underscore = std::fs::read_to_string(dir.path().join("doc_5f1.ast.json")).unwrap();
        assert!(slash.contains("slash()"));
        assert!(underscore.contains("underscore()"));
        assert_eq!(file_safe("caf\u{e9}"), "caf_c3_a9");
    }
}
