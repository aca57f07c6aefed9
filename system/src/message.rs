use crate::types::{Entry, EntryKind, Payload};
use serde::{Deserialize, Serialize};

/// Events a client may send. One websocket text frame carries one event as
/// `{"event": <name>, "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    Drawing(Payload),
    Image(Payload),
    Text(Payload),
    Undo,
    Clear,
    /// Base64 image, optionally wrapped in a `data:` URL.
    GuessRequest(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    History(Vec<Entry>),
    Drawing(Payload),
    Image(Payload),
    Text(Payload),
    Clear,
    GuessResult(String),
}

impl ServerEvent {
    /// The event relaying a peer's entry payload unchanged.
    pub fn relay(kind: EntryKind, payload: Payload) -> Self {
        match kind {
            EntryKind::Line => ServerEvent::Drawing(payload),
            EntryKind::Image => ServerEvent::Image(payload),
            EntryKind::Text => ServerEvent::Text(payload),
        }
    }
}
