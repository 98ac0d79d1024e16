//! Diagnostic event sink.
//!
//! The session records one [`LogEntry`] per protocol event. Consumers plug in
//! an [`EventSink`]: [`TracingSink`] (the default) forwards to `tracing`, and
//! [`LogStore`] keeps an append-only in-memory log that a UI can filter.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use titan_native_client::events::{EventSink, LogFilter, LogStore, ProtocolEvent};
//!
//! let store = Arc::new(LogStore::new());
//! store.emit(ProtocolEvent::RequestIssued { id: 0, method: "GetInfo".into() });
//! store.emit(ProtocolEvent::ResponseReceived { request_id: 0 });
//!
//! assert_eq!(store.len(), 2);
//! assert_eq!(store.filtered(LogFilter::Requests).len(), 1);
//! ```

use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::error::{ErrorKind, TitanError};

/// One protocol event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolEvent {
    /// A request frame was handed to the writer.
    RequestIssued { id: u64, method: String },
    /// A `Response` matched a pending request.
    ResponseReceived { request_id: u64 },
    /// A stream sink was installed.
    StreamStarted { stream_id: u64, data_type: String },
    /// A `StreamData` update was routed to its sink.
    StreamData { stream_id: u64, seq: u64 },
    /// A stream finished, by `StreamEnd` or by local cancellation.
    StreamEnded {
        stream_id: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_code: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
    },
    /// Any failure: server error, decode failure, timeout, lost connection.
    Error { kind: ErrorKind, message: String },
}

impl ProtocolEvent {
    /// Error event for `err`.
    pub fn error(err: &TitanError) -> Self {
        ProtocolEvent::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Coarse classification of a [`LogEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Request,
    Response,
    StreamStart,
    StreamData,
    StreamEnd,
    Error,
}

/// A timestamped protocol event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    /// Wall-clock milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    #[serde(flatten)]
    pub event: ProtocolEvent,
}

impl LogEntry {
    /// Stamp `event` with the current wall-clock time.
    pub fn now(event: ProtocolEvent) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            timestamp_ms,
            event,
        }
    }

    pub fn category(&self) -> EventCategory {
        match self.event {
            ProtocolEvent::RequestIssued { .. } => EventCategory::Request,
            ProtocolEvent::ResponseReceived { .. } => EventCategory::Response,
            ProtocolEvent::StreamStarted { .. } => EventCategory::StreamStart,
            ProtocolEvent::StreamData { .. } => EventCategory::StreamData,
            ProtocolEvent::StreamEnded { .. } => EventCategory::StreamEnd,
            ProtocolEvent::Error { .. } => EventCategory::Error,
        }
    }
}

/// Receiver of protocol events.
///
/// Called from the session's dispatch loop; implementations must not block.
pub trait EventSink: Send + Sync + 'static {
    /// Record one entry.
    fn record(&self, entry: LogEntry);

    /// Stamp and record an event.
    fn emit(&self, event: ProtocolEvent) {
        self.record(LogEntry::now(event));
    }
}

/// Forwards every entry to `tracing`. Errors at `warn`, streaming data at `trace`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, entry: LogEntry) {
        match &entry.event {
            ProtocolEvent::RequestIssued { id, method } => {
                tracing::debug!(id, method = %method, "request issued");
            }
            ProtocolEvent::ResponseReceived { request_id } => {
                tracing::debug!(request_id, "response received");
            }
            ProtocolEvent::StreamStarted {
                stream_id,
                data_type,
            } => {
                tracing::debug!(stream_id, data_type = %data_type, "stream started");
            }
            ProtocolEvent::StreamData { stream_id, seq } => {
                tracing::trace!(stream_id, seq, "stream data");
            }
            ProtocolEvent::StreamEnded {
                stream_id,
                error_code,
                error_message,
            } => {
                tracing::debug!(stream_id, ?error_code, ?error_message, "stream ended");
            }
            ProtocolEvent::Error { kind, message } => {
                tracing::warn!(kind = %kind, "{}", message);
            }
        }
    }
}

/// Which entries [`LogStore::filtered`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFilter {
    #[default]
    All,
    /// Only [`EventCategory::Error`].
    Errors,
    /// Stream start, data and end.
    Streams,
    /// Only [`EventCategory::Request`].
    Requests,
}

impl LogFilter {
    pub fn matches(self, entry: &LogEntry) -> bool {
        match self {
            LogFilter::All => true,
            LogFilter::Errors => entry.category() == EventCategory::Error,
            LogFilter::Streams => matches!(
                entry.category(),
                EventCategory::StreamStart | EventCategory::StreamData | EventCategory::StreamEnd
            ),
            LogFilter::Requests => entry.category() == EventCategory::Request,
        }
    }
}

/// Append-only in-memory event log.
#[derive(Debug, Default)]
pub struct LogStore {
    entries: Mutex<Vec<LogEntry>>,
}

impl LogStore {
    pub fn new() -> Self {
        Self::default()
    }

    // A panicking reader must not take the log down with it.
    fn lock(&self) -> MutexGuard<'_, Vec<LogEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of all entries in arrival order.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    /// Snapshot of the entries matching `filter`.
    pub fn filtered(&self, filter: LogFilter) -> Vec<LogEntry> {
        self.lock()
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// One JSON object per line.
    pub fn to_json_lines(&self) -> serde_json::Result<String> {
        let mut out = String::new();
        for entry in self.lock().iter() {
            out.push_str(&serde_json::to_string(entry)?);
            out.push('\n');
        }
        Ok(out)
    }
}

impl EventSink for LogStore {
    fn record(&self, entry: LogEntry) {
        self.lock().push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated() -> LogStore {
        let store = LogStore::new();
        store.emit(ProtocolEvent::RequestIssued {
            id: 0,
            method: "NewSwapQuoteStream".into(),
        });
        store.emit(ProtocolEvent::ResponseReceived { request_id: 0 });
        store.emit(ProtocolEvent::StreamStarted {
            stream_id: 7,
            data_type: "SwapQuotes".into(),
        });
        store.emit(ProtocolEvent::StreamData {
            stream_id: 7,
            seq: 1,
        });
        store.emit(ProtocolEvent::StreamEnded {
            stream_id: 7,
            error_code: None,
            error_message: None,
        });
        store.emit(ProtocolEvent::error(&TitanError::Timeout {
            method: "StopStream".into(),
        }));
        store
    }

    #[test]
    fn test_filters() {
        let store = populated();
        assert_eq!(store.len(), 6);
        assert_eq!(store.filtered(LogFilter::All).len(), 6);
        assert_eq!(store.filtered(LogFilter::Requests).len(), 1);
        assert_eq!(store.filtered(LogFilter::Streams).len(), 3);

        let errors = store.filtered(LogFilter::Errors);
        assert_eq!(errors.len(), 1);
        match &errors[0].event {
            ProtocolEvent::Error { kind, message } => {
                assert_eq!(*kind, ErrorKind::Timeout);
                assert_eq!(message, "Request timeout: StopStream");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_clear() {
        let store = populated();
        store.clear();
        assert!(store.is_empty());
        assert!(store.filtered(LogFilter::Streams).is_empty());
    }

    #[test]
    fn test_timestamps_are_monotonic_enough() {
        let store = populated();
        let entries = store.entries();
        assert!(entries[0].timestamp_ms > 0);
        assert!(entries.windows(2).all(|w| w[0].timestamp_ms <= w[1].timestamp_ms));
    }

    #[test]
    fn test_json_lines() {
        let store = LogStore::new();
        store.record(LogEntry {
            timestamp_ms: 1_700_000_000_000,
            event: ProtocolEvent::StreamEnded {
                stream_id: 7,
                error_code: Some(3),
                error_message: None,
            },
        });
        store.record(LogEntry {
            timestamp_ms: 1_700_000_000_001,
            event: ProtocolEvent::error(&TitanError::NoProtocolSelected),
        });

        let lines = store.to_json_lines().unwrap();
        let parsed: Vec<serde_json::Value> = lines
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0]["type"], "stream_ended");
        assert_eq!(parsed[0]["stream_id"], 7);
        assert_eq!(parsed[0]["error_code"], 3);
        assert!(parsed[0].get("error_message").is_none());
        assert_eq!(parsed[1]["kind"], "no_protocol_selected");
        assert_eq!(parsed[1]["timestamp_ms"], 1_700_000_000_001u64);
    }

    #[test]
    fn test_tracing_sink_accepts_every_event() {
        let sink = TracingSink;
        for entry in populated().entries() {
            sink.record(entry);
        }
    }
}
