//! Transport seams between the upload state machine and the network.
//!
//! [`HttpTransport`](crate::HttpTransport) implements all three traits on
//! top of `reqwest`; tests swap in scripted fakes.

use std::future::Future;
use std::pin::Pin;

use gphotos_transfer::Fingerprint;

use crate::types::UploadToken;

/// Remote acknowledgment of one chunk exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkResult {
    /// The remote holds the first `n` bytes and expects more.
    Partial(u64),
    /// The upload is finished.
    Complete(UploadToken),
    /// The remote refused the session; it cannot be continued.
    Rejected(String),
}

/// Handle of a freshly opened remote session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedSession {
    pub handle: String,
    /// Chunk sizes must be multiples of this, when advertised.
    pub chunk_granularity: Option<u64>,
}

/// An exchange that did not yield a usable acknowledgment.
///
/// Nothing is known about what the remote received, so the stored
/// session stays valid.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("remote unavailable (HTTP {status}): {body}")]
    Unavailable { status: u16, body: String },
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

/// Failure to open a remote session.
#[derive(Debug, thiserror::Error)]
pub enum NegotiationError {
    #[error("session start refused (HTTP {status}): {body}")]
    Refused { status: u16, body: String },

    #[error("session start response has no upload URL")]
    MissingHandle,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Boxed future returned by the transport traits.
pub type TransportFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Opens remote upload sessions.
pub trait SessionNegotiator: Send + Sync {
    fn open<'a>(
        &'a self,
        fingerprint: &'a Fingerprint,
        total_size: u64,
        content_type: &'a str,
    ) -> TransportFuture<'a, NegotiatedSession, NegotiationError>;
}

/// Sends one byte range of a negotiated session.
///
/// The exchange that reaches `total_size` must ask the remote to finalize.
pub trait ChunkTransport: Send + Sync {
    fn send_chunk<'a>(
        &'a self,
        handle: &'a str,
        data: &'a [u8],
        start_offset: u64,
        total_size: u64,
    ) -> TransportFuture<'a, ChunkResult, TransportError>;
}

/// Single-request upload without a session.
pub trait RawTransport: Send + Sync {
    fn upload_raw<'a>(
        &'a self,
        data: Vec<u8>,
        content_type: &'a str,
    ) -> TransportFuture<'a, ChunkResult, TransportError>;
}
