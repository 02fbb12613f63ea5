use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{PoisonError, RwLock};

use crate::{Fingerprint, UploadSession};

/// Errors from session persistence.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt session for {fingerprint}: {reason}")]
    Corrupt { fingerprint: String, reason: String },

    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

/// Boxed future returned by [`SessionStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Durable fingerprint → session mapping.
///
/// The embedding application picks the backend (memory, file, database).
/// `put` must be durable before it resolves: the uploader only moves on
/// to the next chunk once the remote's acknowledgment is on disk.
pub trait SessionStore: Send + Sync {
    /// Returns the stored session, if any.
    fn get<'a>(&'a self, fingerprint: &'a Fingerprint) -> StoreFuture<'a, Option<UploadSession>>;

    /// Inserts or replaces the session for its fingerprint.
    fn put<'a>(&'a self, session: &'a UploadSession) -> StoreFuture<'a, ()>;

    /// Removes the session. Removing a missing session is not an error.
    fn delete<'a>(&'a self, fingerprint: &'a Fingerprint) -> StoreFuture<'a, ()>;
}

/// Process-local store. Sessions are lost when the process exits.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Fingerprint, UploadSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemorySessionStore {
    fn get<'a>(&'a self, fingerprint: &'a Fingerprint) -> StoreFuture<'a, Option<UploadSession>> {
        Box::pin(async move {
            let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
            Ok(sessions.get(fingerprint).cloned())
        })
    }

    fn put<'a>(&'a self, session: &'a UploadSession) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            sessions.insert(session.fingerprint().clone(), session.clone());
            Ok(())
        })
    }

    fn delete<'a>(&'a self, fingerprint: &'a Fingerprint) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            sessions.remove(fingerprint);
            Ok(())
        })
    }
}
