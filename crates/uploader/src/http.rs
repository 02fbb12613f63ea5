//! `reqwest` implementation of the upload transports.
//!
//! Authentication is the caller's business: build the `reqwest::Client`
//! with an `Authorization` default header before handing it over.

use gphotos_protocol::constants::{
    HEADER_UPLOAD_CHUNK_GRANULARITY, HEADER_UPLOAD_COMMAND, HEADER_UPLOAD_CONTENT_TYPE,
    HEADER_UPLOAD_OFFSET, HEADER_UPLOAD_PROTOCOL, HEADER_UPLOAD_RAW_SIZE,
    HEADER_UPLOAD_SIZE_RECEIVED, HEADER_UPLOAD_STATUS, HEADER_UPLOAD_URL, PROTOCOL_RAW,
    PROTOCOL_RESUMABLE, STATUS_RESUME_INCOMPLETE,
};
use gphotos_protocol::{
    UploadCommand, UploadStatus, parse_chunk_granularity, parse_range_end, parse_size_received,
};
use gphotos_transfer::Fingerprint;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, RANGE};
use reqwest::{Response, StatusCode, Url};
use tracing::{debug, warn};

use crate::error::UploadError;
use crate::transport::{
    ChunkResult, ChunkTransport, NegotiatedSession, NegotiationError, RawTransport,
    SessionNegotiator, TransportError, TransportFuture,
};
use crate::types::UploadToken;

/// Upload transport speaking the `v1/uploads` protocol over HTTP.
pub struct HttpTransport {
    http: reqwest::Client,
    endpoint: Url,
}

impl HttpTransport {
    /// Creates a transport posting new sessions to `endpoint`.
    pub fn new(http: reqwest::Client, endpoint: &str) -> Result<Self, UploadError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| UploadError::Configuration(format!("endpoint {endpoint:?}: {e}")))?;
        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// Statuses after which the same request may succeed later.
fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn error_body(resp: Response) -> String {
    resp.text().await.unwrap_or_default().trim().to_string()
}

/// Maps a chunk exchange response onto a [`ChunkResult`].
async fn interpret_chunk_response(
    resp: Response,
    command: UploadCommand,
    start_offset: u64,
    len: u64,
) -> Result<ChunkResult, TransportError> {
    let status = resp.status();

    if status.as_u16() == STATUS_RESUME_INCOMPLETE {
        // No Range header means nothing was persisted yet.
        return Ok(match header_str(resp.headers(), RANGE.as_str()) {
            None => ChunkResult::Partial(0),
            Some(range) => match parse_range_end(range) {
                Ok(end) => ChunkResult::Partial(end),
                Err(e) => ChunkResult::Rejected(e.to_string()),
            },
        });
    }

    if is_transient(status) {
        return Err(TransportError::Unavailable {
            status: status.as_u16(),
            body: error_body(resp).await,
        });
    }

    if !status.is_success() {
        let code = status.as_u16();
        let body = error_body(resp).await;
        return Ok(ChunkResult::Rejected(format!("HTTP {code}: {body}")));
    }

    let upload_status = header_str(resp.headers(), HEADER_UPLOAD_STATUS).map(UploadStatus::parse);
    let finished =
        command == UploadCommand::UploadFinalize || upload_status == Some(UploadStatus::Final);
    if finished {
        let body = resp.text().await?;
        let token = body.trim();
        if token.is_empty() {
            return Ok(ChunkResult::Rejected(
                "finalized upload returned no token".into(),
            ));
        }
        return Ok(ChunkResult::Complete(UploadToken::new(token)));
    }

    match header_str(resp.headers(), HEADER_UPLOAD_SIZE_RECEIVED) {
        Some(value) => match parse_size_received(value) {
            Ok(received) => Ok(ChunkResult::Partial(received)),
            Err(e) => Ok(ChunkResult::Rejected(e.to_string())),
        },
        None => Ok(ChunkResult::Partial(start_offset + len)),
    }
}

impl SessionNegotiator for HttpTransport {
    fn open<'a>(
        &'a self,
        fingerprint: &'a Fingerprint,
        total_size: u64,
        content_type: &'a str,
    ) -> TransportFuture<'a, NegotiatedSession, NegotiationError> {
        Box::pin(async move {
            let mut req = self
                .http
                .post(self.endpoint.clone())
                .header(CONTENT_LENGTH, "0")
                .header(HEADER_UPLOAD_COMMAND, UploadCommand::Start.as_str())
                .header(HEADER_UPLOAD_PROTOCOL, PROTOCOL_RESUMABLE)
                .header(HEADER_UPLOAD_RAW_SIZE, total_size.to_string());
            if !content_type.is_empty() {
                req = req.header(HEADER_UPLOAD_CONTENT_TYPE, content_type);
            }

            let resp = req.send().await.map_err(TransportError::from)?;
            let status = resp.status();
            if is_transient(status) {
                return Err(TransportError::Unavailable {
                    status: status.as_u16(),
                    body: error_body(resp).await,
                }
                .into());
            }
            if !status.is_success() {
                return Err(NegotiationError::Refused {
                    status: status.as_u16(),
                    body: error_body(resp).await,
                });
            }

            let headers = resp.headers();
            let handle = header_str(headers, HEADER_UPLOAD_URL)
                .filter(|h| !h.is_empty())
                .ok_or(NegotiationError::MissingHandle)?
                .to_string();

            let chunk_granularity = match header_str(headers, HEADER_UPLOAD_CHUNK_GRANULARITY) {
                None => None,
                Some(value) => match parse_chunk_granularity(value) {
                    Ok(g) => Some(g),
                    Err(e) => {
                        warn!(error = %e, "ignoring chunk granularity");
                        None
                    }
                },
            };

            debug!(%fingerprint, total_size, ?chunk_granularity, "upload session opened");
            Ok(NegotiatedSession {
                handle,
                chunk_granularity,
            })
        })
    }
}

impl ChunkTransport for HttpTransport {
    fn send_chunk<'a>(
        &'a self,
        handle: &'a str,
        data: &'a [u8],
        start_offset: u64,
        total_size: u64,
    ) -> TransportFuture<'a, ChunkResult, TransportError> {
        Box::pin(async move {
            let Ok(url) = Url::parse(handle) else {
                return Ok(ChunkResult::Rejected(format!(
                    "session handle is not a URL: {handle}"
                )));
            };

            let len = data.len() as u64;
            let command = UploadCommand::for_chunk(start_offset, len, total_size);
            let resp = self
                .http
                .post(url)
                .header(HEADER_UPLOAD_COMMAND, command.as_str())
                .header(HEADER_UPLOAD_OFFSET, start_offset.to_string())
                .body(data.to_vec())
                .send()
                .await?;

            interpret_chunk_response(resp, command, start_offset, len).await
        })
    }
}

impl RawTransport for HttpTransport {
    fn upload_raw<'a>(
        &'a self,
        data: Vec<u8>,
        content_type: &'a str,
    ) -> TransportFuture<'a, ChunkResult, TransportError> {
        Box::pin(async move {
            let mut req = self
                .http
                .post(self.endpoint.clone())
                .header(CONTENT_TYPE, "application/octet-stream")
                .header(HEADER_UPLOAD_PROTOCOL, PROTOCOL_RAW);
            if !content_type.is_empty() {
                req = req.header(HEADER_UPLOAD_CONTENT_TYPE, content_type);
            }

            let resp = req.body(data).send().await?;
            let status = resp.status();
            if is_transient(status) {
                return Err(TransportError::Unavailable {
                    status: status.as_u16(),
                    body: error_body(resp).await,
                });
            }
            if !status.is_success() {
                let code = status.as_u16();
                let body = error_body(resp).await;
                return Ok(ChunkResult::Rejected(format!("HTTP {code}: {body}")));
            }

            let body = resp.text().await?;
            let token = body.trim();
            if token.is_empty() {
                return Ok(ChunkResult::Rejected("upload returned no token".into()));
            }
            Ok(ChunkResult::Complete(UploadToken::new(token)))
        })
    }
}
