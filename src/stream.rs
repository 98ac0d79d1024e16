//! Stream demultiplexing.
//!
//! Each open stream has exactly one [`StreamSink`] in the session's
//! [`SinkTable`], keyed by the server-assigned stream id. The loop routes
//! `StreamData` to the sink, which decodes the payload and hands it to the
//! consumer's [`UpdateStream`]. A `StreamEnd` removes the sink.
//!
//! ```text
//! Registered -> Active -> Ended
//!                  \---> Cancelled   (consumer stopped or dropped the stream)
//! ```
//!
//! Events for ids with no sink are dropped quietly: the stream may already
//! have ended or been cancelled.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;

use crate::client::ClientInner;
use crate::codec::MsgPackCodec;
use crate::error::{Result, TitanError};
use crate::protocol::{ServerMessage, StreamEndBody, StreamInfo};

/// Consumer side of one stream, as seen by the dispatch loop.
pub(crate) trait StreamSink: Send + 'static {
    /// Decode one decompressed `StreamData` frame and enqueue its value.
    ///
    /// `Ok(false)` means the consumer is gone.
    fn push(&self, frame: &[u8]) -> Result<bool>;

    /// Server ended the stream.
    fn end(self: Box<Self>, end: StreamEndBody);

    /// Session ended under the stream.
    fn fail(self: Box<Self>, err: TitanError);
}

/// Item passed from a sink to its [`UpdateStream`].
#[derive(Debug)]
pub(crate) enum StreamItem<T> {
    Data(T),
    End(StreamEndBody),
    Failed(TitanError),
}

/// Sink that decodes payloads as `T`.
pub(crate) struct TypedSink<T> {
    tx: mpsc::UnboundedSender<StreamItem<T>>,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> TypedSink<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// Create a sink and the receiving half its [`UpdateStream`] reads from.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StreamItem<T>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                _phantom: PhantomData,
            },
            rx,
        )
    }
}

impl<T> StreamSink for TypedSink<T>
where
    T: DeserializeOwned + Send + 'static,
{
    fn push(&self, frame: &[u8]) -> Result<bool> {
        let value = match MsgPackCodec::decode::<ServerMessage<T>>(frame)? {
            ServerMessage::StreamData(body) => body.payload.value,
            _ => return Err(TitanError::Decode("expected StreamData envelope".into())),
        };
        Ok(self.tx.send(StreamItem::Data(value)).is_ok())
    }

    fn end(self: Box<Self>, end: StreamEndBody) {
        let _ = self.tx.send(StreamItem::End(end));
    }

    fn fail(self: Box<Self>, err: TitanError) {
        let _ = self.tx.send(StreamItem::Failed(err));
    }
}

/// Outcome of routing one `StreamData` frame.
#[derive(Debug)]
pub(crate) enum Routed {
    Delivered,
    /// No sink for the id.
    UnknownStream,
    /// Payload tag differs from the stream's data type; ignored.
    TagMismatch { expected: String },
    /// Sink exists but its consumer is gone.
    ConsumerGone,
    /// Payload failed to decode; the stream stays open.
    DecodeFailed(TitanError),
}

struct SinkEntry {
    data_type: String,
    sink: Box<dyn StreamSink>,
}

/// Open streams keyed by stream id. Owned by the session loop.
#[derive(Default)]
pub(crate) struct SinkTable {
    sinks: HashMap<u64, SinkEntry>,
}

impl SinkTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sink` for `info.id`, replacing any stale sink for the same id.
    pub fn install(&mut self, info: &StreamInfo, sink: Box<dyn StreamSink>) {
        let entry = SinkEntry {
            data_type: info.data_type.clone(),
            sink,
        };
        if let Some(stale) = self.sinks.insert(info.id, entry) {
            tracing::warn!("Stream {} registered twice; ending previous consumer", info.id);
            stale.sink.fail(TitanError::StreamFailed {
                stream_id: info.id,
                code: None,
                message: Some("stream id reassigned".into()),
            });
        }
    }

    /// Route a decompressed `StreamData` frame.
    pub fn route(&self, id: u64, tag: &str, frame: &[u8]) -> Routed {
        let Some(entry) = self.sinks.get(&id) else {
            return Routed::UnknownStream;
        };
        if entry.data_type != tag {
            return Routed::TagMismatch {
                expected: entry.data_type.clone(),
            };
        }
        match entry.sink.push(frame) {
            Ok(true) => Routed::Delivered,
            Ok(false) => Routed::ConsumerGone,
            Err(e) => Routed::DecodeFailed(e),
        }
    }

    /// Close and remove the sink named by `end.id`.
    pub fn end(&mut self, end: StreamEndBody) -> bool {
        match self.sinks.remove(&end.id) {
            Some(entry) => {
                entry.sink.end(end);
                true
            }
            None => false,
        }
    }

    /// Remove the sink for `id` without notifying its consumer.
    pub fn cancel(&mut self, id: u64) -> bool {
        self.sinks.remove(&id).is_some()
    }

    /// Fail every open stream and clear the table.
    pub fn fail_all(&mut self, make_err: impl Fn() -> TitanError) -> usize {
        let count = self.sinks.len();
        for (_, entry) in self.sinks.drain() {
            entry.sink.fail(make_err());
        }
        count
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    #[cfg(test)]
    pub fn contains(&self, id: u64) -> bool {
        self.sinks.contains_key(&id)
    }
}

/// Consumer-visible lifecycle of an [`UpdateStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Updates may still arrive.
    Active,
    /// The server sent `StreamEnd`.
    Ended,
    /// The consumer stopped the stream.
    Cancelled,
    /// The session closed under the stream.
    Closed,
}

/// Lazy, single-consumer sequence of updates for one stream.
///
/// Yields `Ok(value)` per update and finishes with `None` after a clean
/// `StreamEnd`. A `StreamEnd` carrying an error yields one
/// `Err(TitanError::StreamFailed)` first; a lost session yields one
/// `Err(TitanError::TransportClosed)`.
///
/// Dropping an active stream deregisters it and sends a best-effort
/// `StopStream` exactly once.
pub struct UpdateStream<T> {
    id: u64,
    data_type: String,
    rx: mpsc::UnboundedReceiver<StreamItem<T>>,
    state: StreamState,
    end: Option<StreamEndBody>,
    client: Option<Arc<ClientInner>>,
}

impl<T> UpdateStream<T> {
    pub(crate) fn new(
        info: StreamInfo,
        rx: mpsc::UnboundedReceiver<StreamItem<T>>,
        client: Arc<ClientInner>,
    ) -> Self {
        Self {
            id: info.id,
            data_type: info.data_type,
            rx,
            state: StreamState::Active,
            end: None,
            client: Some(client),
        }
    }

    /// Server-assigned stream id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Tag every payload of this stream is keyed under.
    pub fn data_type(&self) -> &str {
        &self.data_type
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// The `StreamEnd` that finished the stream, once it has been consumed.
    pub fn end_reason(&self) -> Option<&StreamEndBody> {
        self.end.as_ref()
    }

    /// Cancel the stream and ask the server to stop it.
    ///
    /// Local delivery stops immediately. The `StopStream` outcome is returned
    /// so callers can log it; a stream the server already ended is not an
    /// error worth acting on.
    pub async fn stop(mut self) -> Result<()> {
        let Some(client) = self.client.take() else {
            return Ok(());
        };
        self.state = StreamState::Cancelled;
        client.cancel_stream(self.id);
        client.stop_stream(self.id).await
    }

    fn finish(&mut self, state: StreamState) {
        self.state = state;
        self.client = None;
    }
}

// No field is structurally pinned.
impl<T> Unpin for UpdateStream<T> {}

impl<T> Stream for UpdateStream<T> {
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.state == StreamState::Cancelled {
            return Poll::Ready(None);
        }

        match this.rx.poll_recv(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(StreamItem::Data(value))) => Poll::Ready(Some(Ok(value))),
            Poll::Ready(Some(StreamItem::End(end))) => {
                this.finish(StreamState::Ended);
                let failure = end.is_error().then(|| TitanError::StreamFailed {
                    stream_id: end.id,
                    code: end.error_code,
                    message: end.error_message.clone(),
                });
                this.end = Some(end);
                Poll::Ready(failure.map(Err))
            }
            Poll::Ready(Some(StreamItem::Failed(err))) => {
                this.finish(StreamState::Closed);
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                if this.state == StreamState::Active {
                    this.finish(StreamState::Closed);
                }
                Poll::Ready(None)
            }
        }
    }
}

impl<T> Drop for UpdateStream<T> {
    fn drop(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };
        client.cancel_stream(self.id);

        let id = self.id;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = client.stop_stream(id).await {
                        tracing::debug!("StopStream for dropped stream {} failed: {}", id, e);
                    }
                });
            }
            Err(_) => {
                tracing::debug!("No runtime to stop dropped stream {}; deregistered locally", id);
            }
        }
    }
}

impl<T> std::fmt::Debug for UpdateStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateStream")
            .field("id", &self.id)
            .field("data_type", &self.data_type)
            .field("state", &self.state)
            .finish()
    }
}
