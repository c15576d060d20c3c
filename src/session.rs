//! Session identity.
//!
//! Every webhook request carries a stable, opaque session id so the backend
//! can correlate the turns of one conversation. The id is scoped the way a
//! browser tab scopes its storage: one small file under the OS temp dir,
//! keyed by the controlling terminal where the platform exposes it, so each
//! terminal window holds its own conversation and a reboot starts fresh.
//!
//! ## Usage
//!
//! ```ignore
//! use teacup::session::{FileSessionStore, SessionId};
//!
//! let store = FileSessionStore::per_terminal();
//! let session = SessionId::acquire(&store);
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// File stem of the persisted id.
const STORAGE_KEY: &str = "chat-widget-session-id";

/// Error type for session storage operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where the session id lives between runs.
pub trait SessionStore {
    /// The previously stored id, if there is a usable one.
    fn load(&self) -> Option<String>;

    /// Persist the id for later runs.
    fn store(&self, id: &str) -> Result<(), SessionError>;
}

/// An opaque conversation identifier, stable for the store's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(String);

impl SessionId {
    /// Reuse the stored id when one exists, otherwise generate a fresh
    /// UUID v4 and persist it. A store that cannot persist still yields a
    /// usable id for this run.
    pub fn acquire(store: &dyn SessionStore) -> Self {
        if let Some(id) = store.load() {
            return Self(id);
        }

        let id = Uuid::new_v4().to_string();
        if let Err(err) = store.store(&id) {
            warn!(error = %err, "failed to persist session id, continuing with a volatile one");
        }
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// File-backed store, one file per terminal session.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Store under the OS temp dir, keyed by the controlling terminal so
    /// two terminal windows hold two conversations.
    pub fn per_terminal() -> Self {
        let path = std::env::temp_dir().join(format!("{}-{}", STORAGE_KEY, terminal_tag()));
        Self { path }
    }

    /// Store at an explicit path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Option<String> {
        let raw = fs::read_to_string(&self.path).ok()?;
        let id = raw.trim();
        if id.is_empty() {
            return None;
        }
        Some(id.to_string())
    }

    fn store(&self, id: &str) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, id)?;
        Ok(())
    }
}

/// In-memory store for tests and embedding without a filesystem.
#[derive(Default)]
pub struct MemorySessionStore {
    value: Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Option<String> {
        self.value.lock().ok()?.clone()
    }

    fn store(&self, id: &str) -> Result<(), SessionError> {
        if let Ok(mut value) = self.value.lock() {
            *value = Some(id.to_string());
        }
        Ok(())
    }
}

/// The controlling terminal's device name, flattened to a file-safe tag.
/// Platforms that do not expose it share one tag.
#[cfg(target_os = "linux")]
fn terminal_tag() -> String {
    match fs::read_link("/proc/self/fd/0") {
        Ok(target) => {
            let tag: String = target
                .to_string_lossy()
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
                .collect();
            tag.trim_matches('-').to_string()
        }
        Err(_) => "shared".to_string(),
    }
}

#[cfg(not(target_os = "linux"))]
fn terminal_tag() -> String {
    "shared".to_string()
}
