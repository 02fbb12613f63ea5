//! Directory-backed session store.
//!
//! One `<fingerprint>.json` file per session. Writes go to a temporary
//! file that is synced and then renamed over the target, so a crash
//! leaves either the previous or the new session on disk, never a torn one.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::store::{SessionStore, StoreError, StoreFuture};
use crate::{Fingerprint, UploadSession};

const SESSION_EXT: &str = "json";
const TEMP_EXT: &str = "json.tmp";

/// Persists sessions as JSON files under a directory.
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    /// Opens (and creates if needed) the store directory.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// Returns the store directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.dir
            .join(format!("{}.{SESSION_EXT}", fingerprint.as_str()))
    }

    /// Lists every readable session in the directory.
    ///
    /// Unreadable or corrupt files are skipped with a warning; leftover
    /// temporary files are ignored.
    pub async fn sessions(&self) -> Result<Vec<UploadSession>, StoreError> {
        let mut sessions = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SESSION_EXT) {
                continue;
            }
            match read_session(&path).await {
                Ok(session) => sessions.push(session),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable session"),
            }
        }
        sessions.sort_by_key(|s| s.created_at());
        Ok(sessions)
    }
}

async fn read_session(path: &Path) -> Result<UploadSession, StoreError> {
    let data = tokio::fs::read(path).await?;
    serde_json::from_slice(&data).map_err(|e| StoreError::Corrupt {
        fingerprint: path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        reason: e.to_string(),
    })
}

#[cfg(unix)]
async fn sync_dir(dir: &Path) -> Result<(), StoreError> {
    let handle = tokio::fs::File::open(dir).await?;
    handle.sync_all().await?;
    Ok(())
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> Result<(), StoreError> {
    Ok(())
}

impl SessionStore for FileSessionStore {
    fn get<'a>(&'a self, fingerprint: &'a Fingerprint) -> StoreFuture<'a, Option<UploadSession>> {
        Box::pin(async move {
            let path = self.path_for(fingerprint);
            match read_session(&path).await {
                Ok(session) if session.fingerprint() == fingerprint => Ok(Some(session)),
                Ok(session) => Err(StoreError::Corrupt {
                    fingerprint: fingerprint.to_string(),
                    reason: format!("file holds session for {}", session.fingerprint()),
                }),
                Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e),
            }
        })
    }

    fn put<'a>(&'a self, session: &'a UploadSession) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let path = self.path_for(session.fingerprint());
            let tmp = path.with_extension(TEMP_EXT);
            let data = serde_json::to_vec_pretty(session)?;

            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            drop(file);

            tokio::fs::rename(&tmp, &path).await?;
            sync_dir(&self.dir).await?;

            debug!(
                fingerprint = %session.fingerprint(),
                offset = session.confirmed_offset(),
                "session persisted"
            );
            Ok(())
        })
    }

    fn delete<'a>(&'a self, fingerprint: &'a Fingerprint) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let path = self.path_for(fingerprint);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
                Err(e) => return Err(e.into()),
            }
            sync_dir(&self.dir).await?;
            debug!(fingerprint = %fingerprint, "session removed");
            Ok(())
        })
    }
}
