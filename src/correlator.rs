//! Request/response correlation.
//!
//! [`RequestIds`] hands out request ids (start at 0, strictly increasing,
//! never reused). [`PendingTable`] maps each outstanding id to the caller
//! waiting on it. The table is owned by the session loop alone, so
//! resolution is at most once: whichever of response, error, expiry or
//! transport close reaches the loop first removes the record.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::error::{Result, TitanError};
use crate::protocol::StreamInfo;
use crate::stream::StreamSink;

/// Monotonic request id allocator.
#[derive(Debug, Default)]
pub struct RequestIds {
    next: AtomicU64,
}

impl RequestIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id.
    #[inline]
    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Id the next call to [`next_id`](Self::next_id) will return.
    #[cfg(test)]
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

/// What a pending caller receives on success.
///
/// `frame` is the whole decompressed envelope; the caller decodes the result
/// with the type it expects.
#[derive(Debug, Clone)]
pub struct Reply {
    pub frame: Bytes,
    pub stream: Option<StreamInfo>,
}

/// One outstanding request.
pub(crate) struct PendingRequest {
    pub method: String,
    pub reply: oneshot::Sender<Result<Reply>>,
    /// Consumer-side sink for stream-opening calls, installed when the response lands.
    pub sink: Option<Box<dyn StreamSink>>,
    pub created: Instant,
}

impl PendingRequest {
    pub fn new(
        method: impl Into<String>,
        reply: oneshot::Sender<Result<Reply>>,
        sink: Option<Box<dyn StreamSink>>,
    ) -> Self {
        Self {
            method: method.into(),
            reply,
            sink,
            created: Instant::now(),
        }
    }

    /// Time since the request was registered.
    pub fn age(&self) -> Duration {
        self.created.elapsed()
    }

    /// Deliver the outcome. A caller that already gave up is not an error.
    pub fn complete(self, outcome: Result<Reply>) {
        let _ = self.reply.send(outcome);
    }
}

/// Outstanding requests keyed by id.
#[derive(Default)]
pub(crate) struct PendingTable {
    requests: HashMap<u64, PendingRequest>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: u64, request: PendingRequest) {
        if self.requests.insert(id, request).is_some() {
            tracing::warn!("Request id {} registered twice; previous caller dropped", id);
        }
    }

    /// Remove and return the record for `id`, if still pending.
    pub fn take(&mut self, id: u64) -> Option<PendingRequest> {
        self.requests.remove(&id)
    }

    /// Drop the record for `id` without notifying anyone (caller timed out).
    pub fn expire(&mut self, id: u64) -> bool {
        match self.requests.remove(&id) {
            Some(request) => {
                tracing::debug!(
                    "Request {} ({}) expired after {:?}",
                    id,
                    request.method,
                    request.age()
                );
                true
            }
            None => false,
        }
    }

    /// Reject every outstanding request with a fresh error from `make_err`.
    pub fn reject_all(&mut self, make_err: impl Fn() -> TitanError) -> usize {
        let count = self.requests.len();
        for (_, request) in self.requests.drain() {
            request.complete(Err(make_err()));
        }
        count
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
