//! Data types shared by the upload flows.

use std::fmt;

use gphotos_transfer::Fingerprint;
use serde::{Deserialize, Serialize};

use crate::error::UploadError;

/// Opaque token returned by the remote once the media is fully received.
///
/// Consumed by media-library calls (`mediaItems:batchCreate`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadToken(String);

impl UploadToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for UploadToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of one `upload` call.
pub type UploadOutcome = Result<UploadToken, UploadError>;

/// Whether retrying a failed upload is meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The stored session is intact; calling `upload` again continues it.
    Resumable,
    /// Retrying with the same inputs will not succeed.
    Fatal,
}

/// Progress event emitted during a resumable upload.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    /// A new remote session was opened.
    Negotiated {
        fingerprint: Fingerprint,
        total_size: u64,
    },
    /// A stored session is being continued.
    Resumed {
        fingerprint: Fingerprint,
        offset: u64,
        total_size: u64,
    },
    /// The remote confirmed more bytes and the new offset is persisted.
    Progress {
        fingerprint: Fingerprint,
        confirmed_offset: u64,
        total_size: u64,
    },
    /// Upload finished and the session was purged.
    Completed { fingerprint: Fingerprint },
    /// Upload failed.
    Failed {
        fingerprint: Fingerprint,
        error: String,
        kind: FailureKind,
    },
}
