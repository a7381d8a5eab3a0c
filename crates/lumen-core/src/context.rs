use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::config::LumenConfig;
use crate::error::LumenError;
use crate::events::{ConfigChange, Events};
use crate::state::GlobalState;
use crate::LOCAL_RAG_STORE_DIR;

/// Process-wide context handed to every component at construction.
///
/// Build it once at startup, before the service manager, the index
/// scheduler or the recall orchestrator, and drop it after them.
///
/// # Examples
///
/// ```
/// use lumen_core::{AppContext, LumenConfig};
///
/// let mut config = LumenConfig::default();
/// config.storage.dir = Some(tempfile::tempdir().unwrap().into_path());
/// let ctx = AppContext::new(config).unwrap();
/// assert!(ctx.local_rag_enabled());
/// ctx.set_local_rag(false);
/// assert!(!ctx.local_rag_enabled());
/// ```
#[derive(Debug)]
pub struct AppContext {
    config: RwLock<LumenConfig>,
    storage_root: PathBuf,
    events: Events,
    state: GlobalState,
}

impl AppContext {
    /// Create the context, opening the global state in the storage root.
    pub fn new(config: LumenConfig) -> Result<Self, LumenError> {
        let storage_root = config.storage.resolve();
        let state = GlobalState::open(&storage_root)?;
        Ok(Self {
            config: RwLock::new(config),
            storage_root,
            events: Events::new(),
            state,
        })
    }

    /// A context whose global state lives only in memory.
    pub fn ephemeral(config: LumenConfig) -> Self {
        let storage_root = config.storage.resolve();
        Self {
            config: RwLock::new(config),
            storage_root,
            events: Events::new(),
            state: GlobalState::in_memory(),
        }
    }

    /// A snapshot of the current configuration.
    pub fn config(&self) -> LumenConfig {
        match self.config.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn local_rag_enabled(&self) -> bool {
        match self.config.read() {
            Ok(guard) => guard.recall.local_rag,
            Err(poisoned) => poisoned.into_inner().recall.local_rag,
        }
    }

    /// Toggle local RAG. Subscribers of [`Events::config`] are notified
    /// only when the value actually changes.
    pub fn set_local_rag(&self, enabled: bool) {
        let changed = {
            let mut guard = match self.config.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let changed = guard.recall.local_rag != enabled;
            guard.recall.local_rag = enabled;
            changed
        };
        if changed {
            tracing::info!(enabled, "local RAG toggled");
            self.events.config.publish(&ConfigChange::LocalRag(enabled));
        }
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// Directory holding all local-RAG state.
    pub fn local_rag_dir(&self) -> PathBuf {
        self.storage_root.join(LOCAL_RAG_STORE_DIR)
    }

    pub fn events(&self) -> &Events {
        &self.events
    }

    pub fn state(&self) -> &GlobalState {
        &self.state
    }

    /// Version of this build, reported by the CLI.
    pub fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn ctx() -> (tempfile::TempDir, AppContext) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LumenConfig::default();
        config.storage.dir = Some(dir.path().to_path_buf());
        let ctx = AppContext::new(config).unwrap();
        (dir, ctx)
    }

    #[test]
    fn set_local_rag_publishes_once_per_change() {
        let (_dir, ctx) = ctx();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        ctx.events()
            .config
            .subscribe(move |c| sink.lock().unwrap().push(c.clone()));

        ctx.set_local_rag(true);
        ctx.set_local_rag(false);
        ctx.set_local_rag(false);
        ctx.set_local_rag(true);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![ConfigChange::LocalRag(false), ConfigChange::LocalRag(true)]
        );
    }

    #[test]
    fn local_rag_dir_is_under_storage_root() {
        let (dir, ctx) = ctx();
        assert_eq!(ctx.storage_root(), dir.path());
        assert_eq!(ctx.local_rag_dir(), dir.path().join("local_rag"));
    }

    #[test]
    fn state_persists_in_storage_root() {
        let (dir, ctx) = ctx();
        ctx.state().set_rag_port(31337).unwrap();
        let reopened = GlobalState::open(dir.path()).unwrap();
        assert_eq!(reopened.rag_port(), Some(31337));
    }
}
