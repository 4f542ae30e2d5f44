use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::error::{CcError, ClientErrorCode};

/// Liveness signal. Resets the silence timer, never forwarded to handlers.
pub const HEARTBEAT_EVENT: &str = "HEARTBEAT";
/// Terminal event; its JSON payload resolves `start()`.
pub const END_OF_STREAM_EVENT: &str = "END_OF_STREAM";
/// The server announces it is closing without a terminal event.
pub const SERVER_CLOSE_EVENT: &str = "__CLOSE__";

/// One event delivered to handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    /// SSE event name (`message` when the server sent none).
    pub name: String,
    /// SSE id, if the server sent one.
    pub id: Option<String>,
    pub data: String,
}

impl StreamEvent {
    /// Decodes `data` as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, CcError> {
        serde_json::from_str(&self.data).map_err(|e| {
            CcError::client(
                ClientErrorCode::ResponseDecodeError,
                format!("event `{}` data: {e}", self.name),
            )
        })
    }
}

impl From<eventsource_stream::Event> for StreamEvent {
    fn from(ev: eventsource_stream::Event) -> Self {
        Self {
            name: ev.event,
            id: (!ev.id.is_empty()).then_some(ev.id),
            data: ev.data,
        }
    }
}

/// Payload of the terminal event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndOfStream {
    /// Why the server ended the stream, e.g. `UNTIL_REACHED`.
    #[serde(rename = "endedBy")]
    pub ended_by: String,
    /// Any other fields of the payload.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl EndOfStream {
    pub(crate) fn parse(data: &str) -> Result<Self, CcError> {
        serde_json::from_str(data).map_err(|e| {
            CcError::client(
                ClientErrorCode::SseServerError,
                format!("malformed {END_OF_STREAM_EVENT} payload: {e}"),
            )
        })
    }
}

/// How a successful `start()` ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutcome {
    /// The server sent the terminal event.
    Ended(EndOfStream),
    /// The caller closed the stream.
    Closed(Option<String>),
}

/// Where the stream is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    Idle,
    Connecting,
    Open,
    Paused,
    /// Waiting for the next retry.
    Backoff,
    Closed,
    Failed,
}
