//! Resumable media uploads to Google Photos.
//!
//! This crate implements the **upload session protocol**: negotiating a
//! remote session, sending the payload in ordered chunks, persisting the
//! confirmed offset after every acknowledgment and resuming from it after
//! an interruption. The HTTP client (TLS, auth headers, proxies) is
//! supplied by the caller.
//!
//! # Pipeline
//!
//! 1. **Resolve**: look the fingerprint up in the [`SessionStore`]
//! 2. **Negotiate**: open a remote session when none is stored
//! 3. **Transfer**: send chunks, persisting progress after each one
//! 4. **Finish**: purge the stored session and return the upload token

pub mod error;
pub mod http;
pub mod resumable;
pub mod transport;
pub mod types;
pub mod uploader;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export primary types for convenience.
pub use error::UploadError;
pub use http::HttpTransport;
pub use resumable::{MAX_STALLED_EXCHANGES, ResumableUploader};
pub use transport::{
    ChunkResult, ChunkTransport, NegotiatedSession, NegotiationError, RawTransport,
    SessionNegotiator, TransportError,
};
pub use types::{FailureKind, UploadEvent, UploadOutcome, UploadToken};
pub use uploader::{Uploader, UploaderConfig};

pub use gphotos_transfer::{
    FileSessionStore, Fingerprint, MemorySessionStore, SessionStore, StoreError, UploadSession,
};
