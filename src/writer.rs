//! Dedicated writer task for outbound WebSocket frames.
//!
//! The socket's write half is owned by a single task that receives frames via
//! an mpsc channel. Callers never lock the socket, and frames that are ready
//! together go out with a single flush.
//!
//! # Architecture
//!
//! ```text
//! get_info()        ─┐
//! new_stream()      ─┼─► mpsc::Sender<Outbound> ─► Writer Task ─► WebSocket sink
//! session (close)   ─┘
//! ```

use std::fmt::Display;

use bytes::Bytes;
use futures_util::{Sink, SinkExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};

use crate::error::{Result, TitanError};

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Maximum frames fed before a flush.
const MAX_BATCH_SIZE: usize = 64;

/// Reason sent with the client's normal-closure close frame.
pub const CLIENT_CLOSE_REASON: &str = "Client closed";

/// Work item for the writer task.
#[derive(Debug)]
pub enum Outbound {
    /// Compressed, encoded envelope.
    Frame(Bytes),
    /// Send a normal-closure close frame and stop.
    Close,
}

/// Handle for sending frames to the writer task.
///
/// This is cheaply cloneable and can be shared across callers.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<Outbound>,
}

impl WriterHandle {
    /// Queue a binary frame. Waits if the queue is full.
    ///
    /// Fails with [`TitanError::TransportClosed`] once the writer has stopped.
    pub async fn send(&self, frame: Bytes) -> Result<()> {
        self.tx
            .send(Outbound::Frame(frame))
            .await
            .map_err(|_| TitanError::TransportClosed)
    }

    /// Queue the close frame. Frames queued earlier are still written first.
    pub async fn close(&self) -> Result<()> {
        self.tx
            .send(Outbound::Close)
            .await
            .map_err(|_| TitanError::TransportClosed)
    }

    /// True once the writer task has exited.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn the writer task and return a handle for sending frames.
///
/// # Arguments
///
/// * `sink` - The WebSocket write half
/// * `capacity` - Queue capacity before `send` starts waiting
///
/// # Returns
///
/// A tuple of `(WriterHandle, JoinHandle)` where the JoinHandle can be used
/// to wait for the writer task to complete.
pub fn spawn_writer_task<S>(sink: S, capacity: usize) -> (WriterHandle, JoinHandle<Result<()>>)
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let task = tokio::spawn(writer_loop(rx, sink));
    (WriterHandle { tx }, task)
}

/// Main writer loop - receives frames and writes them to the socket.
async fn writer_loop<S>(mut rx: mpsc::Receiver<Outbound>, mut sink: S) -> Result<()>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    loop {
        // Wait for first item
        let Some(first) = rx.recv().await else {
            // Channel closed, clean shutdown
            return Ok(());
        };

        // Collect additional ready items (non-blocking)
        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        batch.push(first);
        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(item) => batch.push(item),
                Err(_) => break,
            }
        }

        if write_batch(&mut sink, batch).await? {
            return Ok(());
        }
    }
}

/// Feed a batch and flush once. Returns `true` if the batch ended with a close.
async fn write_batch<S>(sink: &mut S, batch: Vec<Outbound>) -> Result<bool>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    for item in batch {
        match item {
            Outbound::Frame(frame) => {
                sink.feed(Message::Binary(frame)).await.map_err(write_err)?;
            }
            Outbound::Close => {
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: Utf8Bytes::from_static(CLIENT_CLOSE_REASON),
                };
                sink.send(Message::Close(Some(frame)))
                    .await
                    .map_err(write_err)?;
                return Ok(true);
            }
        }
    }
    sink.flush().await.map_err(write_err)?;
    Ok(false)
}

fn write_err(e: impl Display) -> TitanError {
    tracing::error!("WebSocket write failed: {}", e);
    TitanError::TransportClosed
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    /// Sink that forwards every message to an unbounded channel.
    fn capture() -> (
        impl Sink<Message, Error = std::convert::Infallible> + Unpin + Send + 'static,
        mpsc::UnboundedReceiver<Message>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = futures_util::sink::unfold(tx, |tx, msg: Message| async move {
            let _ = tx.send(msg);
            Ok::<_, std::convert::Infallible>(tx)
        });
        (Box::pin(sink), rx)
    }

    #[tokio::test]
    async fn test_frames_written_in_order() {
        let (sink, mut rx) = capture();
        let (handle, _task) = spawn_writer_task(sink, 16);

        for i in 0..10u8 {
            handle.send(Bytes::from(vec![i])).await.unwrap();
        }

        for i in 0..10u8 {
            match rx.recv().await.unwrap() {
                Message::Binary(b) => assert_eq!(&b[..], &[i]),
                other => panic!("unexpected message: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_close_sends_normal_close_frame_and_stops() {
        let (sink, mut rx) = capture();
        let (handle, task) = spawn_writer_task(sink, 16);

        handle.send(Bytes::from_static(b"last")).await.unwrap();
        handle.close().await.unwrap();

        assert!(matches!(rx.recv().await.unwrap(), Message::Binary(_)));
        match rx.recv().await.unwrap() {
            Message::Close(Some(frame)) => {
                assert_eq!(frame.code, CloseCode::Normal);
                assert_eq!(frame.reason.as_str(), CLIENT_CLOSE_REASON);
            }
            other => panic!("unexpected message: {other:?}"),
        }

        assert!(task.await.unwrap().is_ok());
        assert!(handle.is_closed());
        let err = handle.send(Bytes::from_static(b"late")).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::TransportClosed);
    }

    #[tokio::test]
    async fn test_writer_shutdown_on_channel_close() {
        let (sink, _rx) = capture();
        let (handle, task) = spawn_writer_task(sink, 16);

        // Drop the handle to close the channel
        drop(handle);

        // Writer task should complete cleanly
        let result = task.await.unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_sink_error_stops_writer() {
        let failing = futures_util::sink::unfold((), |_, _msg: Message| async move {
            Err::<(), _>("broken pipe")
        });
        let (handle, task) = spawn_writer_task(Box::pin(failing), 4);

        handle.send(Bytes::from_static(b"x")).await.unwrap();
        let result = task.await.unwrap();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_duplex_websocket_pair() {
        use tokio_tungstenite::tungstenite::protocol::Role;
        use tokio_tungstenite::WebSocketStream;

        let (a, b) = tokio::io::duplex(4096);
        let client = WebSocketStream::from_raw_socket(a, Role::Client, None).await;
        let mut server = WebSocketStream::from_raw_socket(b, Role::Server, None).await;

        let (write, _read) = client.split();
        let (handle, _task) = spawn_writer_task(write, 8);
        handle.send(Bytes::from_static(b"\x80")).await.unwrap();

        match server.next().await.unwrap().unwrap() {
            Message::Binary(b) => assert_eq!(&b[..], b"\x80"),
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
