//! Fan-out of client events over the shared event log.
//!
//! The router never talks to a transport. Each handler mutates the log it is
//! given and returns the deliveries the caller must perform, in order.

use crate::event_log::EventLog;
use crate::message::{ClientEvent, ServerEvent};
use crate::types::{ConnectionId, Entry, EntryKind, Payload};
use crate::undo;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Recipients {
    Only(ConnectionId),
    AllExcept(ConnectionId),
    All,
}

impl Recipients {
    pub fn includes(&self, connection_id: &ConnectionId) -> bool {
        match self {
            Recipients::Only(id) => id == connection_id,
            Recipients::AllExcept(id) => id != connection_id,
            Recipients::All => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub to: Recipients,
    pub event: ServerEvent,
}

impl Delivery {
    pub fn new(to: Recipients, event: ServerEvent) -> Self {
        Self { to, event }
    }
}

/// A joining connection receives the full log before anything else.
pub fn on_connect(log: &EventLog, connection_id: ConnectionId) -> Vec<Delivery> {
    vec![Delivery::new(
        Recipients::Only(connection_id),
        ServerEvent::History(log.snapshot().to_vec()),
    )]
}

pub fn on_client_event(
    log: &mut EventLog,
    from: ConnectionId,
    event: ClientEvent,
) -> Vec<Delivery> {
    match event {
        ClientEvent::Drawing(payload) => append_and_relay(log, from, EntryKind::Line, payload),
        ClientEvent::Image(payload) => append_and_relay(log, from, EntryKind::Image, payload),
        ClientEvent::Text(payload) => append_and_relay(log, from, EntryKind::Text, payload),
        ClientEvent::Undo => undo::undo(log, &from),
        ClientEvent::Clear => {
            log.clear();
            log::info!("Connection {} cleared the board", from);
            vec![Delivery::new(Recipients::All, ServerEvent::Clear)]
        }
        // Captioning happens outside the board.
        ClientEvent::GuessRequest(_) => Vec::new(),
    }
}

fn append_and_relay(
    log: &mut EventLog,
    from: ConnectionId,
    kind: EntryKind,
    payload: Payload,
) -> Vec<Delivery> {
    log.append(Entry::new(kind, from, payload.clone()));
    vec![Delivery::new(
        Recipients::AllExcept(from),
        ServerEvent::relay(kind, payload),
    )]
}
