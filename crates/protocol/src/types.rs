use std::fmt;

/// Value of the `X-Goog-Upload-Command` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadCommand {
    /// Opens a new resumable session.
    Start,
    /// Appends bytes at the given offset.
    Upload,
    /// Appends the final bytes and closes the session.
    UploadFinalize,
}

impl UploadCommand {
    /// Returns the header value for this command.
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadCommand::Start => "start",
            UploadCommand::Upload => "upload",
            UploadCommand::UploadFinalize => "upload, finalize",
        }
    }

    /// Picks the command for a chunk covering `[start, start + len)` of `total` bytes.
    pub fn for_chunk(start: u64, len: u64, total: u64) -> Self {
        if start + len >= total {
            UploadCommand::UploadFinalize
        } else {
            UploadCommand::Upload
        }
    }
}

impl fmt::Display for UploadCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of the `X-Goog-Upload-Status` response header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    Final,
    /// Any value this crate does not know about.
    Unknown(String),
}

impl UploadStatus {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "final" => UploadStatus::Final,
            other => UploadStatus::Unknown(other.to_string()),
        }
    }
}
