//! Upload facade choosing between the simple and the resumable flow.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use gphotos_protocol::constants::{DEFAULT_CHUNK_SIZE, DEFAULT_UPLOAD_ENDPOINT};
use gphotos_transfer::{Fingerprint, SessionStore, TransferError, UploadSession};
use reqwest::Url;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::UploadError;
use crate::http::HttpTransport;
use crate::resumable::ResumableUploader;
use crate::transport::{ChunkResult, ChunkTransport, RawTransport, SessionNegotiator};
use crate::types::{UploadEvent, UploadOutcome};

/// Upload configuration, validated by [`Uploader::new`].
#[derive(Clone)]
pub struct UploaderConfig {
    /// Use upload sessions that survive interruptions. Requires `store`.
    pub resumable: bool,
    pub store: Option<Arc<dyn SessionStore>>,
    pub endpoint: String,
    /// Bytes per chunk, rounded down to the remote's granularity.
    pub chunk_size: usize,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            resumable: false,
            store: None,
            endpoint: DEFAULT_UPLOAD_ENDPOINT.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl fmt::Debug for UploaderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploaderConfig")
            .field("resumable", &self.resumable)
            .field("store", &self.store.as_ref().map(|_| "<dyn SessionStore>"))
            .field("endpoint", &self.endpoint)
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

impl UploaderConfig {
    /// Resumable configuration persisting sessions in `store`.
    pub fn resumable(store: Arc<dyn SessionStore>) -> Self {
        Self {
            resumable: true,
            store: Some(store),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), UploadError> {
        if self.resumable && self.store.is_none() {
            return Err(UploadError::Configuration(
                "resumable uploads need a session store".into(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(UploadError::Configuration(
                "chunk size must be greater than zero".into(),
            ));
        }
        Url::parse(&self.endpoint).map_err(|e| {
            UploadError::Configuration(format!("endpoint {:?}: {e}", self.endpoint))
        })?;
        Ok(())
    }
}

/// Entry point for uploading media.
pub struct Uploader {
    raw: Arc<dyn RawTransport>,
    resumable: Option<ResumableUploader>,
    cancel: CancellationToken,
}

impl Uploader {
    /// Builds an uploader talking HTTP through `http`.
    ///
    /// `http` carries authentication; see [`HttpTransport`].
    pub fn new(config: UploaderConfig, http: reqwest::Client) -> Result<Self, UploadError> {
        config.validate()?;
        let transport = Arc::new(HttpTransport::new(http, &config.endpoint)?);
        Self::with_transport(config, transport)
    }

    /// Builds an uploader over a custom transport.
    pub fn with_transport<T>(config: UploaderConfig, transport: Arc<T>) -> Result<Self, UploadError>
    where
        T: SessionNegotiator + ChunkTransport + RawTransport + 'static,
    {
        config.validate()?;
        let cancel = CancellationToken::new();
        let resumable = match (config.resumable, config.store) {
            (true, Some(store)) => Some(
                ResumableUploader::new(
                    transport.clone(),
                    transport.clone(),
                    store,
                    config.chunk_size,
                )
                .with_cancel_token(cancel.clone()),
            ),
            _ => None,
        };
        Ok(Self {
            raw: transport,
            resumable,
            cancel,
        })
    }

    /// Sends resumable-flow events to `tx`.
    pub fn with_events(mut self, tx: mpsc::Sender<UploadEvent>) -> Self {
        self.resumable = self.resumable.map(|r| r.with_events(tx));
        self
    }

    pub fn is_resumable(&self) -> bool {
        self.resumable.is_some()
    }

    /// Returns the token that cancels uploads of this instance.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Uploads `total_size` bytes of `source`.
    pub async fn upload<R>(
        &self,
        fingerprint: &Fingerprint,
        source: R,
        total_size: u64,
        content_type: &str,
    ) -> UploadOutcome
    where
        R: AsyncRead + AsyncSeek + Unpin + Send,
    {
        match &self.resumable {
            Some(resumable) => {
                resumable
                    .upload(fingerprint, source, total_size, content_type)
                    .await
            }
            None => {
                self.upload_simple(fingerprint, source, total_size, content_type)
                    .await
            }
        }
    }

    /// Fingerprints and uploads a file.
    pub async fn upload_file(&self, path: &Path, content_type: &str) -> UploadOutcome {
        let (fingerprint, size) = Fingerprint::for_file(path).await?;
        let file = tokio::fs::File::open(path).await.map_err(TransferError::from)?;
        info!(path = %path.display(), %fingerprint, size, "uploading file");
        self.upload(&fingerprint, file, size, content_type).await
    }

    /// Returns the stored session for `fingerprint`. Always `None` for the
    /// simple flow.
    pub async fn status(&self, fingerprint: &Fingerprint) -> Result<Option<UploadSession>, UploadError> {
        match &self.resumable {
            Some(resumable) => resumable.status(fingerprint).await,
            None => Ok(None),
        }
    }

    /// Forgets the stored session for `fingerprint`.
    pub async fn abandon(&self, fingerprint: &Fingerprint) -> Result<(), UploadError> {
        match &self.resumable {
            Some(resumable) => resumable.abandon(fingerprint).await,
            None => Ok(()),
        }
    }

    async fn upload_simple<R>(
        &self,
        fingerprint: &Fingerprint,
        source: R,
        total_size: u64,
        content_type: &str,
    ) -> UploadOutcome
    where
        R: AsyncRead + Unpin + Send,
    {
        if self.cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        let mut data = Vec::new();
        source
            .take(total_size)
            .read_to_end(&mut data)
            .await
            .map_err(TransferError::from)?;
        if data.len() as u64 != total_size {
            return Err(TransferError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("source holds {} of {total_size} bytes", data.len()),
            ))
            .into());
        }

        debug!(%fingerprint, total_size, "raw upload");
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(UploadError::Cancelled),
            r = self.raw.upload_raw(data, content_type) => r?,
        };
        match result {
            ChunkResult::Complete(token) => {
                info!(%fingerprint, "upload complete");
                Ok(token)
            }
            ChunkResult::Rejected(reason) => Err(UploadError::Rejected(reason)),
            ChunkResult::Partial(n) => Err(UploadError::Rejected(format!(
                "raw upload acknowledged only {n} bytes"
            ))),
        }
    }
}
