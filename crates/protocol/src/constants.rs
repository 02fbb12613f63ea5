/// API endpoint URL for uploading media.
pub const DEFAULT_UPLOAD_ENDPOINT: &str = "https://photoslibrary.googleapis.com/v1/uploads";

/// Default chunk size for resumable uploads (4 MiB).
///
/// A multiple of the granularity Google advertises today (256 KiB), so
/// it rarely needs rounding after negotiation.
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Selects the upload protocol (`resumable` or `raw`).
pub const HEADER_UPLOAD_PROTOCOL: &str = "X-Goog-Upload-Protocol";

/// Command carried by every resumable request.
pub const HEADER_UPLOAD_COMMAND: &str = "X-Goog-Upload-Command";

/// MIME type of the media being uploaded.
pub const HEADER_UPLOAD_CONTENT_TYPE: &str = "X-Goog-Upload-Content-Type";

/// Declared total size of the media, sent on session start.
pub const HEADER_UPLOAD_RAW_SIZE: &str = "X-Goog-Upload-Raw-Size";

/// Session URL returned by the start command.
pub const HEADER_UPLOAD_URL: &str = "X-Goog-Upload-URL";

/// Chunk granularity advertised by the start response.
pub const HEADER_UPLOAD_CHUNK_GRANULARITY: &str = "X-Goog-Upload-Chunk-Granularity";

/// Byte offset of the chunk carried by an upload command.
pub const HEADER_UPLOAD_OFFSET: &str = "X-Goog-Upload-Offset";

/// Session status reported by the remote (`active`, `final`, `cancelled`).
pub const HEADER_UPLOAD_STATUS: &str = "X-Goog-Upload-Status";

/// Number of bytes the remote has persisted for the session.
pub const HEADER_UPLOAD_SIZE_RECEIVED: &str = "X-Goog-Upload-Size-Received";

/// Value of [`HEADER_UPLOAD_PROTOCOL`] for resumable sessions.
pub const PROTOCOL_RESUMABLE: &str = "resumable";

/// Value of [`HEADER_UPLOAD_PROTOCOL`] for single-shot uploads.
pub const PROTOCOL_RAW: &str = "raw";

/// "Resume incomplete" status code used by Google resumable endpoints.
pub const STATUS_RESUME_INCOMPLETE: u16 = 308;
