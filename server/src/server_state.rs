use std::collections::HashSet;
use system::uuid::Uuid;
use system::ConnectionId;

/// Identities of the currently open connections.
///
/// An identity is allocated on connect and retired on disconnect. Entries
/// keep the identity they were written under, so a retired identity simply
/// never shows up as an undo author again.
pub struct ServerState {
    connections: HashSet<ConnectionId>,
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            connections: HashSet::new(),
        }
    }

    pub fn create_connection(&mut self) -> ConnectionId {
        let connection_id = self.new_connection_id();
        self.connections.insert(connection_id);
        log::info!(
            "Connection {} opened ({} online)",
            connection_id,
            self.connections.len()
        );
        connection_id
    }

    pub fn disconnect(&mut self, connection_id: &ConnectionId) -> bool {
        let removed = self.connections.remove(connection_id);
        if removed {
            log::info!(
                "Connection {} closed ({} online)",
                connection_id,
                self.connections.len()
            );
        }
        removed
    }

    pub fn is_connected(&self, connection_id: &ConnectionId) -> bool {
        self.connections.contains(connection_id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    fn new_connection_id(&self) -> ConnectionId {
        loop {
            let candidate = Uuid::new_v4();
            if !self.connections.contains(&candidate) {
                break candidate;
            }
        }
    }
}
