//! Upload error types.

use gphotos_transfer::{StoreError, TransferError};

use crate::transport::{NegotiationError, TransportError};
use crate::types::{FailureKind, UploadToken};

/// Errors produced by an upload attempt.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("session negotiation failed: {0}")]
    Negotiation(#[from] NegotiationError),

    #[error("upload rejected: {0}")]
    Rejected(String),

    #[error("{0}")]
    Network(#[from] TransportError),

    #[error("no progress after {exchanges} exchanges at offset {offset}")]
    Stalled { offset: u64, exchanges: u32 },

    #[error("cancelled")]
    Cancelled,

    #[error("reading content failed: {0}")]
    Source(#[from] TransferError),

    #[error("session store error: {0}")]
    Store(#[from] StoreError),

    #[error("upload rejected ({reason}) and its session could not be purged: {source}")]
    RejectedNotPurged {
        reason: String,
        #[source]
        source: StoreError,
    },

    #[error("upload finished but its session could not be purged: {source}")]
    Purge {
        token: UploadToken,
        #[source]
        source: StoreError,
    },
}

impl UploadError {
    /// Classifies the failure for the caller's retry decision.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Network(_) | Self::Stalled { .. } | Self::Cancelled | Self::Source(_) => {
                FailureKind::Resumable
            }
            Self::Configuration(_)
            | Self::Negotiation(_)
            | Self::Rejected(_)
            | Self::RejectedNotPurged { .. }
            | Self::Store(_)
            | Self::Purge { .. } => FailureKind::Fatal,
        }
    }

    pub fn is_resumable(&self) -> bool {
        self.kind() == FailureKind::Resumable
    }
}
