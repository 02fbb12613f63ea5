use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Fingerprint;

/// Rejected attempt to move a session's confirmed offset.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OffsetError {
    #[error("confirmed offset regressed from {current} to {reported}")]
    Regressed { current: u64, reported: u64 },

    #[error("confirmed offset {reported} is past the {limit} bytes sent")]
    Overrun { limit: u64, reported: u64 },
}

/// Persisted state of one resumable upload.
///
/// `confirmed_offset` only ever grows; the only way to change it is
/// [`advance`](Self::advance).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    fingerprint: Fingerprint,
    session_handle: String,
    confirmed_offset: u64,
    total_size: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    chunk_granularity: Option<u64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UploadSession {
    /// Creates a freshly negotiated session with nothing confirmed yet.
    pub fn new(
        fingerprint: Fingerprint,
        session_handle: impl Into<String>,
        total_size: u64,
        content_type: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            fingerprint,
            session_handle: session_handle.into(),
            confirmed_offset: 0,
            total_size,
            content_type: content_type.into(),
            chunk_granularity: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Records the chunk granularity advertised by the remote.
    pub fn with_chunk_granularity(mut self, granularity: Option<u64>) -> Self {
        self.chunk_granularity = granularity.filter(|g| *g > 0);
        self
    }

    /// Moves the confirmed offset to `reported`.
    ///
    /// `limit` is the end of the byte range that was just sent; the remote
    /// cannot have confirmed more than that. A value below the current
    /// offset is refused and leaves the session untouched.
    pub fn advance(&mut self, reported: u64, limit: u64) -> Result<(), OffsetError> {
        if reported < self.confirmed_offset {
            return Err(OffsetError::Regressed {
                current: self.confirmed_offset,
                reported,
            });
        }
        if reported > limit {
            return Err(OffsetError::Overrun { limit, reported });
        }
        self.confirmed_offset = reported;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Returns `true` if this stored session can continue an upload of
    /// `total_size` bytes.
    ///
    /// An empty payload has nothing to confirm, so its session stays
    /// usable until the finalizing exchange succeeds.
    pub fn can_resume(&self, total_size: u64) -> bool {
        self.total_size == total_size
            && (self.confirmed_offset < total_size || total_size == 0)
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn session_handle(&self) -> &str {
        &self.session_handle
    }

    pub fn confirmed_offset(&self) -> u64 {
        self.confirmed_offset
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn chunk_granularity(&self) -> Option<u64> {
        self.chunk_granularity
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Bytes still to be confirmed.
    pub fn remaining(&self) -> u64 {
        self.total_size.saturating_sub(self.confirmed_offset)
    }
}
