//! Session state for resumable media uploads.
//!
//! Everything the upload orchestrator needs to survive a process restart:
//! content fingerprints, the persisted [`UploadSession`], the pluggable
//! [`SessionStore`] with memory and file backends, and an async
//! [`ChunkReader`] that re-reads the payload from any confirmed offset.

mod chunked;
mod file_store;
mod fingerprint;
mod progress;
mod session;
mod store;

pub use chunked::{Chunk, ChunkReader, align_chunk_size};
pub use file_store::FileSessionStore;
pub use fingerprint::Fingerprint;
pub use progress::SpeedCalculator;
pub use session::{OffsetError, UploadSession};
pub use store::{MemorySessionStore, SessionStore, StoreError, StoreFuture};

pub use gphotos_protocol::constants::DEFAULT_CHUNK_SIZE;

/// Errors produced by the transfer crate outside of session persistence.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid fingerprint: {0:?}")]
    InvalidFingerprint(String),

    #[error("offset {offset} is past the end of a {total}-byte payload")]
    InvalidOffset { offset: u64, total: u64 },
}
