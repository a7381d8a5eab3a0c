use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;

use crate::error::LumenError;

const STATE_FILE: &str = "global-state.json";
const RAG_PORT_KEY: &str = "rag-port";

/// Process-wide key/value state persisted as JSON in the storage root.
///
/// Values survive restarts, so a later session can find a retrieval
/// service started by an earlier one.
///
/// # Examples
///
/// ```
/// use lumen_core::GlobalState;
///
/// let dir = tempfile::tempdir().unwrap();
/// let state = GlobalState::open(dir.path()).unwrap();
/// state.set_rag_port(12345).unwrap();
///
/// let reopened = GlobalState::open(dir.path()).unwrap();
/// assert_eq!(reopened.rag_port(), Some(12345));
/// ```
#[derive(Debug)]
pub struct GlobalState {
    path: PathBuf,
    values: Mutex<BTreeMap<String, Value>>,
}

impl GlobalState {
    /// Open the state file under `storage_root`, creating nothing until the
    /// first write. A corrupt file is treated as empty.
    pub fn open(storage_root: &Path) -> Result<Self, LumenError> {
        let path = storage_root.join(STATE_FILE);
        let values = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            match serde_json::from_str(&content) {
                Ok(values) => values,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable global state");
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    /// State that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::new(),
            values: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    /// Set `key` and write the whole state back to disk.
    pub fn set(&self, key: &str, value: Value) -> Result<(), LumenError> {
        let snapshot = {
            let mut values = self.lock();
            values.insert(key.to_string(), value);
            serde_json::to_string_pretty(&*values)?
        };
        self.persist(&snapshot)
    }

    pub fn remove(&self, key: &str) -> Result<(), LumenError> {
        let snapshot = {
            let mut values = self.lock();
            if values.remove(key).is_none() {
                return Ok(());
            }
            serde_json::to_string_pretty(&*values)?
        };
        self.persist(&snapshot)
    }

    /// Port of the last retrieval service this machine started.
    pub fn rag_port(&self) -> Option<u16> {
        self.get(RAG_PORT_KEY)
            .and_then(|v| v.as_u64())
            .and_then(|p| u16::try_from(p).ok())
    }

    pub fn set_rag_port(&self, port: u16) -> Result<(), LumenError> {
        self.set(RAG_PORT_KEY, Value::from(port))
    }

    fn persist(&self, content: &str) -> Result<(), LumenError> {
        if self.path.as_os_str().is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Value>> {
        match self.values.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
