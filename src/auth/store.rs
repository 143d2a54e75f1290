//! Persistent storage for the session token pair.
//!
//! The store is the sole owner of the credentials; the dispatcher and the
//! refresh coordinator read through its accessors and never cache a token
//! beyond a single request. An empty store is the normal logged-out state,
//! not an error.

use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// The access/refresh token pair issued by `POST /token/`.
///
/// Both tokens are opaque strings. The access token may expire while the
/// refresh token is still valid; a successful refresh replaces only the
/// access half.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Read/write access to the current token pair.
///
/// Implementations use interior mutability so the store can be shared
/// between the dispatcher and the coordinator behind an `Arc`. Writes never
/// fail from the caller's perspective; a file-backed store that cannot
/// persist degrades to a warning and keeps the in-memory copy authoritative.
pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Option<TokenPair>;
    fn set(&self, pair: TokenPair);
    fn clear(&self);
}

/// In-memory store, used by tests and by callers that do not want the
/// session to survive the process.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: RwLock<Option<TokenPair>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

// Lock poisoning is recovered with `into_inner`: the stored pair is a plain
// value that stays valid even if a holder panicked mid-access, and the trait
// API is infallible.
impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<TokenPair> {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set(&self, pair: TokenPair) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = Some(pair);
    }

    fn clear(&self) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

/// File-backed store persisting the pair as JSON so a login survives
/// process restarts.
pub struct FileCredentialStore {
    path: PathBuf,
    cached: RwLock<Option<TokenPair>>,
}

impl FileCredentialStore {
    /// Open the store at `path`, loading any previously persisted pair.
    /// A missing or unreadable file is treated as logged out.
    pub fn open(path: PathBuf) -> Self {
        let cached = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(pair) => Some(pair),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Discarding unparseable token file");
                    None
                }
            },
            Err(_) => None,
        };
        debug!(path = %path.display(), loaded = cached.is_some(), "Opened credential store");
        Self {
            path,
            cached: RwLock::new(cached),
        }
    }

    fn persist(&self, pair: &TokenPair) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(error = %e, "Failed to create token directory");
                return;
            }
        }
        match serde_json::to_string_pretty(pair) {
            Ok(contents) => {
                if let Err(e) = std::fs::write(&self.path, contents) {
                    warn!(path = %self.path.display(), error = %e, "Failed to persist tokens");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize tokens"),
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Option<TokenPair> {
        self.cached.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set(&self, pair: TokenPair) {
        self.persist(&pair);
        *self.cached.write().unwrap_or_else(|e| e.into_inner()) = Some(pair);
    }

    fn clear(&self) {
        *self.cached.write().unwrap_or_else(|e| e.into_inner()) = None;
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), error = %e, "Failed to remove token file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(access: &str, refresh: &str) -> TokenPair {
        TokenPair {
            access: access.to_string(),
            refresh: refresh.to_string(),
        }
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryCredentialStore::new();
        assert!(store.get().is_none());

        store.set(pair("a1", "r1"));
        let got = store.get().expect("pair should be present");
        assert_eq!(got.access, "a1");
        assert_eq!(got.refresh, "r1");

        store.clear();
        assert!(store.get().is_none());
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tokens.json");

        let store = FileCredentialStore::open(path.clone());
        assert!(store.get().is_none());
        store.set(pair("a1", "r1"));

        let reopened = FileCredentialStore::open(path.clone());
        let got = reopened.get().expect("pair should survive reopen");
        assert_eq!(got.access, "a1");

        reopened.clear();
        assert!(!path.exists());
        assert!(FileCredentialStore::open(path).get().is_none());
    }

    #[test]
    fn poisoned_lock_still_serves_credentials() {
        let store = std::sync::Arc::new(MemoryCredentialStore::new());
        store.set(pair("a1", "r1"));

        // Poison the lock by panicking while holding the write guard.
        let poisoner = store.clone();
        let result = std::thread::spawn(move || {
            let _guard = poisoner.inner.write().unwrap_or_else(|e| e.into_inner());
            panic!("poison the credential lock");
        })
        .join();
        assert!(result.is_err());

        // Later accesses recover the data instead of panicking in turn.
        let got = store.get().expect("pair should still be readable");
        assert_eq!(got.access, "a1");
        store.clear();
        assert!(store.get().is_none());
    }

    #[test]
    fn file_store_ignores_corrupt_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, "not json").expect("write");

        let store = FileCredentialStore::open(path);
        assert!(store.get().is_none());
    }
}
