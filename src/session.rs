//! Session dispatch loop.
//!
//! One task per connection reads the socket and serves commands from the
//! facade. It is the only owner of the pending-request table and the stream
//! sink table, so neither needs a lock.
//!
//! ```text
//! socket read half ──► ┌──────────────┐ ──► oneshot (pending caller)
//!                      │ session loop │ ──► mpsc   (stream consumer)
//! Command channel ───► └──────────────┘ ──► WriterHandle (close frame)
//! ```
//!
//! Commands are polled before socket frames, so a request registered before
//! its frame was written is always known by the time its response is read.

use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;

use crate::codec::{decompress_frame, Compression};
use crate::correlator::{PendingRequest, PendingTable, Reply};
use crate::error::TitanError;
use crate::events::{EventSink, ProtocolEvent};
use crate::protocol::{decode_header, ServerHeader, ServerMessage};
use crate::stream::{Routed, SinkTable};
use crate::writer::WriterHandle;

/// Callback fired once when the connection drops without a normal close.
pub type ConnectionLostCallback = Box<dyn FnOnce() + Send + 'static>;

/// Request from the facade to the session loop.
pub(crate) enum Command {
    /// Track a request whose frame is about to be written.
    Register { id: u64, pending: PendingRequest },
    /// The caller stopped waiting for `id`.
    Expire { id: u64 },
    /// Stop routing updates for stream `id`.
    CancelStream { id: u64 },
    /// Send a normal close and report back once the socket is closed.
    Close { done: oneshot::Sender<()> },
}

/// Everything the loop needs besides the socket.
pub(crate) struct SessionContext {
    pub compression: Compression,
    pub writer: WriterHandle,
    pub events: Arc<dyn EventSink>,
    pub open: Arc<AtomicBool>,
    pub on_connection_lost: Option<ConnectionLostCallback>,
}

/// Spawn the loop over the socket's read half.
pub(crate) fn spawn_session<R, E>(
    reader: R,
    commands: mpsc::UnboundedReceiver<Command>,
    ctx: SessionContext,
) -> JoinHandle<()>
where
    R: Stream<Item = std::result::Result<Message, E>> + Unpin + Send + 'static,
    E: Display + Send + 'static,
{
    tokio::spawn(Session::new(ctx).run(reader, commands))
}

/// How the socket ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shutdown {
    /// Close frame with code 1000.
    Normal,
    /// Close frame with any other code.
    Abnormal(u16),
    /// Stream ended or errored without a close frame.
    Dropped,
}

struct Session {
    compression: Compression,
    writer: WriterHandle,
    events: Arc<dyn EventSink>,
    open: Arc<AtomicBool>,
    on_connection_lost: Option<ConnectionLostCallback>,
    pending: PendingTable,
    sinks: SinkTable,
    close_waiters: Vec<oneshot::Sender<()>>,
    close_requested: bool,
    close_code: Option<CloseCode>,
}

impl Session {
    fn new(ctx: SessionContext) -> Self {
        Self {
            compression: ctx.compression,
            writer: ctx.writer,
            events: ctx.events,
            open: ctx.open,
            on_connection_lost: ctx.on_connection_lost,
            pending: PendingTable::new(),
            sinks: SinkTable::new(),
            close_waiters: Vec::new(),
            close_requested: false,
            close_code: None,
        }
    }

    async fn run<R, E>(mut self, mut reader: R, mut commands: mpsc::UnboundedReceiver<Command>)
    where
        R: Stream<Item = std::result::Result<Message, E>> + Unpin,
        E: Display,
    {
        let mut commands_open = true;

        let shutdown = loop {
            tokio::select! {
                biased;

                cmd = commands.recv(), if commands_open => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => {
                        // Every client handle is gone.
                        commands_open = false;
                        self.request_close().await;
                    }
                },

                msg = reader.next() => match msg {
                    Some(Ok(Message::Binary(frame))) => self.handle_frame(frame),
                    Some(Ok(Message::Text(_))) => {
                        tracing::warn!("Ignoring text frame; only binary frames carry envelopes");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let code = frame.map(|f| f.code).unwrap_or(CloseCode::Status);
                        tracing::debug!("Received close frame: {:?}", code);
                        self.close_code = Some(code);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        if self.close_code.is_none() && !self.close_requested {
                            tracing::error!("WebSocket read error: {}", e);
                        }
                        break self.shutdown_kind();
                    }
                    None => break self.shutdown_kind(),
                },
            }
        };

        self.finish(shutdown);
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Register { id, pending } => {
                if self.close_requested {
                    pending.complete(Err(TitanError::NotConnected));
                } else {
                    self.pending.insert(id, pending);
                }
            }
            Command::Expire { id } => {
                self.pending.expire(id);
            }
            Command::CancelStream { id } => {
                if self.sinks.cancel(id) {
                    tracing::debug!("Stream {} cancelled by consumer", id);
                    self.events.emit(ProtocolEvent::StreamEnded {
                        stream_id: id,
                        error_code: None,
                        error_message: None,
                    });
                }
            }
            Command::Close { done } => {
                self.close_waiters.push(done);
                self.request_close().await;
            }
        }
    }

    async fn request_close(&mut self) {
        self.open.store(false, Ordering::Release);
        if self.close_requested {
            return;
        }
        self.close_requested = true;
        if let Err(e) = self.writer.close().await {
            tracing::debug!("Close frame not sent: {}", e);
        }
    }

    fn shutdown_kind(&self) -> Shutdown {
        match self.close_code {
            Some(CloseCode::Normal) => Shutdown::Normal,
            Some(code) => Shutdown::Abnormal(code.into()),
            None => Shutdown::Dropped,
        }
    }

    /// Decompress, read the routing header, dispatch. Failures stay local to the frame.
    fn handle_frame(&mut self, frame: Bytes) {
        let decoded = match decompress_frame(&frame, self.compression) {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) => return self.report_frame_error(e),
        };
        let header = match decode_header(&decoded) {
            Ok(header) => header,
            Err(e) => return self.report_frame_error(e),
        };
        self.dispatch(header, decoded);
    }

    fn report_frame_error(&self, err: TitanError) {
        tracing::error!("Failed to decode message: {}", err);
        self.events.emit(ProtocolEvent::error(&err));
    }

    fn dispatch(&mut self, header: ServerHeader, frame: Bytes) {
        match header {
            ServerMessage::Response(body) => {
                let Some(pending) = self.pending.take(body.request_id) else {
                    tracing::warn!("Got response for unknown request ID: {}", body.request_id);
                    return;
                };
                self.events.emit(ProtocolEvent::ResponseReceived {
                    request_id: body.request_id,
                });

                let stream = body.stream;
                let mut pending = pending;
                if let (Some(info), Some(sink)) = (stream.as_ref(), pending.sink.take()) {
                    self.sinks.install(info, sink);
                    self.events.emit(ProtocolEvent::StreamStarted {
                        stream_id: info.id,
                        data_type: info.data_type.clone(),
                    });
                }
                pending.complete(Ok(Reply { frame, stream }));
            }
            ServerMessage::Error(body) => {
                let Some(pending) = self.pending.take(body.request_id) else {
                    tracing::warn!("Got error for unknown request ID: {}", body.request_id);
                    return;
                };
                let err = TitanError::ServerError(body.message_or_default());
                self.events.emit(ProtocolEvent::error(&err));
                pending.complete(Err(err));
            }
            ServerMessage::StreamData(body) => {
                match self.sinks.route(body.id, &body.payload.tag, &frame) {
                    Routed::Delivered => self.events.emit(ProtocolEvent::StreamData {
                        stream_id: body.id,
                        seq: body.seq,
                    }),
                    Routed::UnknownStream => {
                        tracing::debug!("Dropping data for unknown stream {}", body.id);
                    }
                    Routed::TagMismatch { expected } => {
                        tracing::debug!(
                            "Ignoring {} payload on stream {} (expects {})",
                            body.payload.tag,
                            body.id,
                            expected
                        );
                    }
                    Routed::ConsumerGone => {
                        tracing::debug!("Consumer of stream {} is gone", body.id);
                    }
                    Routed::DecodeFailed(e) => {
                        tracing::error!("Stream {} payload decode failed: {}", body.id, e);
                        self.events.emit(ProtocolEvent::error(&e));
                    }
                }
            }
            ServerMessage::StreamEnd(body) => {
                let event = ProtocolEvent::StreamEnded {
                    stream_id: body.id,
                    error_code: body.error_code,
                    error_message: body.error_message.clone(),
                };
                if self.sinks.end(body) {
                    self.events.emit(event);
                } else {
                    tracing::debug!("Dropping end for unknown stream");
                }
            }
        }
    }

    fn finish(mut self, shutdown: Shutdown) {
        self.open.store(false, Ordering::Release);

        let rejected = self.pending.reject_all(|| TitanError::TransportClosed);
        let failed = self.sinks.fail_all(|| TitanError::TransportClosed);
        tracing::debug!(
            "Session ended ({:?}): rejected {} pending, closed {} streams",
            shutdown,
            rejected,
            failed
        );

        if shutdown != Shutdown::Normal && !self.close_requested {
            let reason = match shutdown {
                Shutdown::Abnormal(code) => format!("WebSocket connection lost (code {code})"),
                _ => "WebSocket connection lost".to_string(),
            };
            tracing::warn!("{}", reason);
            self.events.emit(ProtocolEvent::Error {
                kind: TitanError::TransportClosed.kind(),
                message: reason,
            });
            if let Some(callback) = self.on_connection_lost.take() {
                callback();
            }
        }

        for done in self.close_waiters.drain(..) {
            let _ = done.send(());
        }
    }
}
