use crate::connection::ConnectionEvent;
use std::collections::HashMap;
use std::sync::Arc;
use system::{ConnectionId, Delivery, ServerEvent};

pub type ConnectionTx = tokio::sync::mpsc::UnboundedSender<ConnectionEvent>;

/// Outbound channels of the open connections.
///
/// A channel whose receiving side is gone is dropped on the first failed
/// send, and its id is reported back so the caller can retire it.
pub struct ConnectionTxStorage {
    connection_txs: HashMap<ConnectionId, ConnectionTx>,
}

impl ConnectionTxStorage {
    pub fn new() -> Self {
        Self {
            connection_txs: HashMap::new(),
        }
    }

    pub fn insert(&mut self, connection_id: ConnectionId, tx: ConnectionTx) {
        self.connection_txs.insert(connection_id, tx);
    }

    /// Returns false when the connection is unknown or its channel is closed.
    pub fn send(&mut self, to: &ConnectionId, message: ConnectionEvent) -> bool {
        let closed = match self.connection_txs.get(to) {
            Some(tx) => tx.send(message).is_err(),
            None => {
                log::warn!("Unknown connection {}, dropping message", to);
                return false;
            }
        };
        if closed {
            log::warn!("Connection {} is gone, dropping message", to);
            self.connection_txs.remove(to);
        }
        !closed
    }

    /// Fire-and-forget fan-out. The event is shared, not cloned, per recipient.
    pub fn deliver(&mut self, delivery: Delivery) -> Vec<ConnectionId> {
        let Delivery { to, event } = delivery;
        let event: Arc<ServerEvent> = Arc::new(event);
        let closed: Vec<ConnectionId> = self
            .connection_txs
            .iter()
            .filter(|(connection_id, _)| to.includes(connection_id))
            .filter(|(_, tx)| tx.send(ConnectionEvent::Event(event.clone())).is_err())
            .map(|(connection_id, _)| *connection_id)
            .collect();
        for connection_id in &closed {
            log::warn!("Connection {} is gone, dropping event", connection_id);
            self.connection_txs.remove(connection_id);
        }
        closed
    }

    pub fn remove(&mut self, connection_id: &ConnectionId) -> Option<ConnectionTx> {
        self.connection_txs.remove(connection_id)
    }
}
