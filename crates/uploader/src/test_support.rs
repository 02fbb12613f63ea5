//! Scripted remote and instrumented store shared by the unit tests.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use gphotos_transfer::{
    Fingerprint, MemorySessionStore, SessionStore, StoreError, StoreFuture, UploadSession,
};

use crate::transport::{
    ChunkResult, ChunkTransport, NegotiatedSession, NegotiationError, RawTransport,
    SessionNegotiator, TransportError, TransportFuture,
};
use crate::types::UploadToken;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap()
}

/// Deterministic test payload.
pub(crate) fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Token the fake remote issues for `data` when no fixed token is set.
pub(crate) fn content_token(data: &[u8]) -> UploadToken {
    UploadToken::new(format!("TOKEN-{}", Fingerprint::from_bytes("", data)))
}

#[derive(Debug, Clone)]
pub(crate) struct Exchange {
    pub handle: String,
    pub offset: u64,
    pub len: usize,
}

/// In-memory remote that stores the bytes it receives.
///
/// Exchange indices count every `send_chunk` call from zero, across
/// upload attempts.
#[derive(Default)]
pub(crate) struct FakeRemote {
    token: Option<String>,
    granularity: Option<u64>,
    refuse_open: bool,
    hang_at: Option<usize>,
    fail_at: HashSet<usize>,
    script: Mutex<VecDeque<ChunkResult>>,
    received: Mutex<Vec<u8>>,
    exchanges: Mutex<Vec<Exchange>>,
    negotiations: AtomicUsize,
    raw_uploads: Mutex<Vec<(Vec<u8>, String)>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn with_granularity(mut self, granularity: u64) -> Self {
        self.granularity = Some(granularity);
        self
    }

    pub fn refusing_open(mut self) -> Self {
        self.refuse_open = true;
        self
    }

    pub fn failing_at(mut self, indices: &[usize]) -> Self {
        self.fail_at.extend(indices);
        self
    }

    pub fn hanging_at(mut self, index: usize) -> Self {
        self.hang_at = Some(index);
        self
    }

    /// Answers the first exchanges with `results` instead of simulating.
    pub fn scripted(self, results: Vec<ChunkResult>) -> Self {
        *lock(&self.script) = results.into();
        self
    }

    pub fn exchanges(&self) -> Vec<Exchange> {
        lock(&self.exchanges).clone()
    }

    pub fn negotiations(&self) -> usize {
        self.negotiations.load(Ordering::SeqCst)
    }

    pub fn raw_uploads(&self) -> Vec<(Vec<u8>, String)> {
        lock(&self.raw_uploads).clone()
    }

    fn token_for(&self, data: &[u8]) -> UploadToken {
        match &self.token {
            Some(t) => UploadToken::new(t.clone()),
            None => content_token(data),
        }
    }
}

impl SessionNegotiator for FakeRemote {
    fn open<'a>(
        &'a self,
        _fingerprint: &'a Fingerprint,
        _total_size: u64,
        _content_type: &'a str,
    ) -> TransportFuture<'a, NegotiatedSession, NegotiationError> {
        Box::pin(async move {
            if self.refuse_open {
                return Err(NegotiationError::Refused {
                    status: 403,
                    body: "forbidden".into(),
                });
            }
            let n = self.negotiations.fetch_add(1, Ordering::SeqCst);
            Ok(NegotiatedSession {
                handle: format!("https://upload.test/session/{n}"),
                chunk_granularity: self.granularity,
            })
        })
    }
}

impl ChunkTransport for FakeRemote {
    fn send_chunk<'a>(
        &'a self,
        handle: &'a str,
        data: &'a [u8],
        start_offset: u64,
        total_size: u64,
    ) -> TransportFuture<'a, ChunkResult, TransportError> {
        Box::pin(async move {
            let index = {
                let mut exchanges = lock(&self.exchanges);
                exchanges.push(Exchange {
                    handle: handle.to_string(),
                    offset: start_offset,
                    len: data.len(),
                });
                exchanges.len() - 1
            };

            if self.hang_at == Some(index) {
                std::future::pending::<()>().await;
            }
            if self.fail_at.contains(&index) {
                return Err(TransportError::Network("connection reset".into()));
            }
            let scripted = lock(&self.script).pop_front();
            if let Some(result) = scripted {
                return Ok(result);
            }

            let mut received = lock(&self.received);
            received.truncate(start_offset as usize);
            received.extend_from_slice(data);
            let end = start_offset + data.len() as u64;
            if end >= total_size {
                Ok(ChunkResult::Complete(self.token_for(&received)))
            } else {
                Ok(ChunkResult::Partial(end))
            }
        })
    }
}

impl RawTransport for FakeRemote {
    fn upload_raw<'a>(
        &'a self,
        data: Vec<u8>,
        content_type: &'a str,
    ) -> TransportFuture<'a, ChunkResult, TransportError> {
        Box::pin(async move {
            let token = self.token_for(&data);
            lock(&self.raw_uploads).push((data, content_type.to_string()));
            Ok(ChunkResult::Complete(token))
        })
    }
}

/// Memory store that records every written offset and can be told to fail.
#[derive(Default)]
pub(crate) struct RecordingStore {
    inner: MemorySessionStore,
    puts: Mutex<Vec<u64>>,
    put_limit: Mutex<Option<usize>>,
    fail_deletes: AtomicBool,
}

impl RecordingStore {
    /// Offsets of every successful `put`, in order.
    pub fn put_offsets(&self) -> Vec<u64> {
        lock(&self.puts).clone()
    }

    /// Lets `n` more puts through, then fails every following one.
    pub fn fail_puts_after(&self, n: usize) {
        let done = lock(&self.puts).len();
        *lock(&self.put_limit) = Some(done + n);
    }

    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl SessionStore for RecordingStore {
    fn get<'a>(&'a self, fingerprint: &'a Fingerprint) -> StoreFuture<'a, Option<UploadSession>> {
        self.inner.get(fingerprint)
    }

    fn put<'a>(&'a self, session: &'a UploadSession) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            {
                let mut puts = lock(&self.puts);
                if let Some(limit) = *lock(&self.put_limit) {
                    if puts.len() >= limit {
                        return Err(StoreError::Unavailable("disk full".into()));
                    }
                }
                puts.push(session.confirmed_offset());
            }
            self.inner.put(session).await
        })
    }

    fn delete<'a>(&'a self, fingerprint: &'a Fingerprint) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            if self.fail_deletes.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("read-only".into()));
            }
            self.inner.delete(fingerprint).await
        })
    }
}
