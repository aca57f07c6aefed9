use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender, WeakUnboundedSender};

use system::router::{on_client_event, on_connect};
use system::{ClientEvent, ConnectionId, Delivery, EventLog, Recipients, ServerEvent};

use crate::caption::{guess, Captioner};
use crate::connection::ConnectionEvent;
use crate::connection_tx_storage::{ConnectionTx, ConnectionTxStorage};
use crate::server_state::ServerState;

pub type ServerTx = UnboundedSender<ServerCommand>;

/// Everything that may touch the board goes through this one queue.
#[derive(Debug)]
pub enum ServerCommand {
    Connect {
        tx: ConnectionTx,
    },
    Disconnect {
        from: ConnectionId,
    },
    ClientEvent {
        from: ConnectionId,
        event: ClientEvent,
    },
    GuessFinished {
        text: String,
    },
}

struct Server {
    server_state: ServerState,
    connections: ConnectionTxStorage,
    log: EventLog,
    captioner: Arc<dyn Captioner>,
    srv_tx: WeakUnboundedSender<ServerCommand>,
}

impl Server {
    fn new(captioner: Arc<dyn Captioner>, srv_tx: WeakUnboundedSender<ServerCommand>) -> Self {
        Self {
            server_state: ServerState::new(),
            connections: ConnectionTxStorage::new(),
            log: EventLog::new(),
            captioner,
            srv_tx,
        }
    }

    fn handle_server_command(&mut self, command: ServerCommand) {
        match command {
            ServerCommand::Connect { tx } => {
                let connection_id = self.server_state.create_connection();
                self.connections.insert(connection_id, tx);
                if self
                    .connections
                    .send(&connection_id, ConnectionEvent::Connected { connection_id })
                {
                    let deliveries = on_connect(&self.log, connection_id);
                    self.deliver_all(deliveries);
                } else {
                    self.server_state.disconnect(&connection_id);
                }
            }
            ServerCommand::Disconnect { from } => {
                if self.server_state.disconnect(&from) {
                    self.connections.remove(&from);
                } else {
                    log::debug!("Connection {} is already retired", from);
                }
            }
            ServerCommand::ClientEvent { from, event } => {
                if !self.server_state.is_connected(&from) {
                    log::warn!("Ignoring event from retired connection {}", from);
                    return;
                }
                match event {
                    ClientEvent::GuessRequest(image) => self.request_guess(from, image),
                    event => {
                        let deliveries = on_client_event(&mut self.log, from, event);
                        self.deliver_all(deliveries);
                    }
                }
            }
            ServerCommand::GuessFinished { text } => {
                log::info!("Broadcasting guess to {} connections", self.server_state.len());
                self.deliver_all(vec![Delivery::new(
                    Recipients::All,
                    ServerEvent::GuessResult(text),
                )]);
            }
        }
    }

    /// The captioning call runs on its own task; its result comes back as a
    /// `GuessFinished` command, so other clients keep being served meanwhile.
    fn request_guess(&self, from: ConnectionId, image: String) {
        log::info!(
            "Connection {} requested a guess ({} bytes)",
            from,
            image.len()
        );
        let captioner = self.captioner.clone();
        let srv_tx = self.srv_tx.clone();
        tokio::spawn(async move {
            let text = guess(captioner.as_ref(), &image).await;
            match srv_tx.upgrade() {
                Some(srv_tx) => {
                    if srv_tx.send(ServerCommand::GuessFinished { text }).is_err() {
                        log::warn!("Server stopped before guess finished");
                    }
                }
                None => log::warn!("Server stopped before guess finished"),
            }
        });
    }

    /// Connections found closed while delivering are retired on the spot.
    fn deliver_all(&mut self, deliveries: Vec<Delivery>) {
        for delivery in deliveries {
            for connection_id in self.connections.deliver(delivery) {
                self.server_state.disconnect(&connection_id);
            }
        }
    }
}

pub fn spawn_server(captioner: Arc<dyn Captioner>) -> ServerTx {
    let (srv_tx, mut srv_rx) = unbounded_channel::<ServerCommand>();
    let weak_tx = srv_tx.downgrade();

    tokio::spawn(async move {
        let mut server = Box::new(Server::new(captioner, weak_tx));

        while let Some(command) = srv_rx.recv().await {
            server.handle_server_command(command);
        }
        log::info!("Server loop terminated");
    });

    srv_tx
}
