//! Resumable upload orchestration.
//!
//! Resolves the stored session for a fingerprint (or negotiates a new
//! one), sends chunks from the confirmed offset and persists every
//! acknowledgment before moving on. Supports cancellation and emits
//! [`UploadEvent`]s on an optional channel.

use std::sync::Arc;

use gphotos_transfer::{
    ChunkReader, Fingerprint, SessionStore, UploadSession, align_chunk_size,
};
use tokio::io::{AsyncRead, AsyncSeek};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::UploadError;
use crate::transport::{ChunkResult, ChunkTransport, SessionNegotiator};
use crate::types::{UploadEvent, UploadOutcome, UploadToken};

/// Consecutive acknowledgments without progress tolerated before giving up.
pub const MAX_STALLED_EXCHANGES: u32 = 3;

/// Drives uploads through negotiated, persisted sessions.
pub struct ResumableUploader {
    negotiator: Arc<dyn SessionNegotiator>,
    transport: Arc<dyn ChunkTransport>,
    store: Arc<dyn SessionStore>,
    chunk_size: usize,
    cancel: CancellationToken,
    events_tx: Option<mpsc::Sender<UploadEvent>>,
}

impl ResumableUploader {
    pub fn new(
        negotiator: Arc<dyn SessionNegotiator>,
        transport: Arc<dyn ChunkTransport>,
        store: Arc<dyn SessionStore>,
        chunk_size: usize,
    ) -> Self {
        Self {
            negotiator,
            transport,
            store,
            chunk_size,
            cancel: CancellationToken::new(),
            events_tx: None,
        }
    }

    /// Replaces the cancellation token.
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Sends progress events to `tx`. Events are dropped when the channel is full.
    pub fn with_events(mut self, tx: mpsc::Sender<UploadEvent>) -> Self {
        self.events_tx = Some(tx);
        self
    }

    /// Returns a cancellation token for uploads driven by this instance.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Returns the stored session for `fingerprint`, if any.
    pub async fn status(&self, fingerprint: &Fingerprint) -> Result<Option<UploadSession>, UploadError> {
        Ok(self.store.get(fingerprint).await?)
    }

    /// Forgets the stored session; the next upload negotiates a new one.
    pub async fn abandon(&self, fingerprint: &Fingerprint) -> Result<(), UploadError> {
        self.store.delete(fingerprint).await?;
        info!(%fingerprint, "upload session abandoned");
        Ok(())
    }

    /// Uploads `total_size` bytes of `source`, continuing a stored session
    /// when one matches.
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
        let result = self.run(fingerprint, source, total_size, content_type).await;
        match &result {
            Ok(_) => self.emit(UploadEvent::Completed {
                fingerprint: fingerprint.clone(),
            }),
            Err(e) => {
                warn!(%fingerprint, error = %e, kind = ?e.kind(), "upload failed");
                self.emit(UploadEvent::Failed {
                    fingerprint: fingerprint.clone(),
                    error: e.to_string(),
                    kind: e.kind(),
                });
            }
        }
        result
    }

    async fn run<R>(
        &self,
        fingerprint: &Fingerprint,
        source: R,
        total_size: u64,
        content_type: &str,
    ) -> UploadOutcome
    where
        R: AsyncRead + AsyncSeek + Unpin + Send,
    {
        self.check_cancelled()?;
        let mut session = self
            .resolve_session(fingerprint, total_size, content_type)
            .await?;
        self.transfer(&mut session, source).await
    }

    /// Loads a resumable session or negotiates a fresh one.
    async fn resolve_session(
        &self,
        fingerprint: &Fingerprint,
        total_size: u64,
        content_type: &str,
    ) -> Result<UploadSession, UploadError> {
        if let Some(stored) = self.store.get(fingerprint).await? {
            if stored.can_resume(total_size) {
                info!(
                    %fingerprint,
                    offset = stored.confirmed_offset(),
                    total_size,
                    "resuming upload"
                );
                self.emit(UploadEvent::Resumed {
                    fingerprint: fingerprint.clone(),
                    offset: stored.confirmed_offset(),
                    total_size,
                });
                return Ok(stored);
            }
            warn!(
                %fingerprint,
                stored_size = stored.total_size(),
                stored_offset = stored.confirmed_offset(),
                total_size,
                "discarding stale session"
            );
            self.store.delete(fingerprint).await?;
        }

        let negotiated = self
            .negotiator
            .open(fingerprint, total_size, content_type)
            .await?;
        let session = UploadSession::new(
            fingerprint.clone(),
            negotiated.handle,
            total_size,
            content_type,
        )
        .with_chunk_granularity(negotiated.chunk_granularity);
        self.store.put(&session).await?;

        info!(%fingerprint, total_size, "upload session negotiated");
        self.emit(UploadEvent::Negotiated {
            fingerprint: fingerprint.clone(),
            total_size,
        });
        Ok(session)
    }

    /// Sends chunks until the remote completes, rejects, or an error stops us.
    async fn transfer<R>(&self, session: &mut UploadSession, source: R) -> UploadOutcome
    where
        R: AsyncRead + AsyncSeek + Unpin + Send,
    {
        let fingerprint = session.fingerprint().clone();
        let total_size = session.total_size();
        let chunk_size = align_chunk_size(self.chunk_size, session.chunk_granularity());
        let mut reader = ChunkReader::new(source, chunk_size, total_size);
        let mut stalled = 0u32;

        loop {
            self.check_cancelled()?;

            let chunk = reader.chunk_at(session.confirmed_offset()).await?;
            let exchange = self.transport.send_chunk(
                session.session_handle(),
                &chunk.data,
                chunk.offset,
                total_size,
            );
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(UploadError::Cancelled),
                r = exchange => r,
            };

            match result {
                Ok(ChunkResult::Partial(reported)) => {
                    let previous = session.confirmed_offset();
                    if let Err(violation) = session.advance(reported, chunk.end()) {
                        warn!(%fingerprint, error = %violation, "invalid acknowledgment");
                        return Err(self.purge_rejected(&fingerprint, violation.to_string()).await);
                    }
                    self.store.put(session).await?;

                    if reported == previous {
                        stalled += 1;
                        if stalled > MAX_STALLED_EXCHANGES {
                            return Err(UploadError::Stalled {
                                offset: reported,
                                exchanges: stalled,
                            });
                        }
                        debug!(%fingerprint, offset = reported, stalled, "no progress");
                    } else {
                        stalled = 0;
                        debug!(%fingerprint, offset = reported, total_size, "chunk confirmed");
                        self.emit(UploadEvent::Progress {
                            fingerprint: fingerprint.clone(),
                            confirmed_offset: reported,
                            total_size,
                        });
                    }
                }
                Ok(ChunkResult::Complete(token)) => {
                    return self.finish(&fingerprint, token).await;
                }
                Ok(ChunkResult::Rejected(reason)) => {
                    return Err(self.purge_rejected(&fingerprint, reason).await);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn finish(&self, fingerprint: &Fingerprint, token: UploadToken) -> UploadOutcome {
        if let Err(source) = self.store.delete(fingerprint).await {
            error!(%fingerprint, error = %source, "upload finished but session was not purged");
            return Err(UploadError::Purge { token, source });
        }
        info!(%fingerprint, "upload complete");
        Ok(token)
    }

    /// Drops a session the remote will not continue.
    ///
    /// A failed delete is reported alongside the rejection since the stale
    /// session would otherwise be resumed on the next attempt.
    async fn purge_rejected(&self, fingerprint: &Fingerprint, reason: String) -> UploadError {
        if let Err(source) = self.store.delete(fingerprint).await {
            error!(%fingerprint, error = %source, "failed to purge rejected session");
            return UploadError::RejectedNotPurged { reason, source };
        }
        UploadError::Rejected(reason)
    }

    fn check_cancelled(&self) -> Result<(), UploadError> {
        if self.cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }
        Ok(())
    }

    fn emit(&self, event: UploadEvent) {
        if let Some(tx) = &self.events_tx {
            if tx.try_send(event).is_err() {
                debug!("upload event dropped");
            }
        }
    }
}
