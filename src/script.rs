//! Server-side Lua scripts referenced by SHA.

use std::sync::Arc;

use parking_lot::Mutex;

/// A Lua script whose SHA is resolved by the server on first load and then
/// cached here. Share it between pipelines as `Arc<Script>`.
#[derive(Debug)]
pub struct Script {
    source: String,
    sha: Mutex<Option<String>>,
}

impl Script {
    pub fn new(source: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            source: source.into(),
            sha: Mutex::new(None),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// The cached SHA, if the script has been loaded.
    pub fn sha(&self) -> Option<String> {
        self.sha.lock().clone()
    }

    pub fn set_sha(&self, sha: impl Into<String>) {
        *self.sha.lock() = Some(sha.into());
    }

    /// Forget the cached SHA, e.g. after `SCRIPT FLUSH`.
    pub fn clear_sha(&self) {
        *self.sha.lock() = None;
    }
}

// ── Tests ──────────────────────────────────────────────────────────
