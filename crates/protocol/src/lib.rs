//! Wire-level vocabulary of the Google Photos `v1/uploads` endpoint.
//!
//! Header names, command values and the small parsers needed to read
//! the remote's acknowledgments. Nothing here performs I/O.

pub mod constants;
pub mod headers;
pub mod types;

// Re-export primary types for convenience.
pub use headers::{
    HeaderError, parse_chunk_granularity, parse_range_end, parse_size_received,
};
pub use types::{UploadCommand, UploadStatus};
