use std::sync::Arc;

use actix::{Actor, ActorContext, AsyncContext, Handler, Message, Running, StreamHandler};
use actix_http::ws::Item;
use actix_web::web::Bytes;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use actix_web_actors::ws::{CloseCode, CloseReason};
use tokio::sync::mpsc::UnboundedReceiver;

use system::{serde_json, ClientEvent, ConnectionId, ServerEvent};

use crate::config::Config;
use crate::server::{ServerCommand, ServerTx};

#[derive(Debug)]
pub enum ConnectionEvent {
    Connected { connection_id: ConnectionId },
    Event(Arc<ServerEvent>),
}

#[derive(Message)]
#[rtype(result = "()")]
struct ConnectionActorMessage(ConnectionEvent);

enum ConnectionState {
    /// Waiting for the server to hand out an identity. Events received in
    /// the meantime are held back in order.
    Idle(Vec<ClientEvent>),
    Connected(ConnectionId),
}

enum Fragment {
    Text(Vec<u8>),
    Binary,
}

/// What the actor has to do about one incoming websocket message.
#[derive(Debug)]
enum Reaction {
    Forward(ServerCommand),
    Held,
    Ignore,
    Pong(Bytes),
    Close(Option<CloseReason>),
}

/// Ingress bookkeeping of one connection, kept apart from the actor context.
struct Inbox {
    state: ConnectionState,
    fragment: Option<Fragment>,
    max_message_size: usize,
}

impl Inbox {
    fn new(max_message_size: usize) -> Self {
        Self {
            state: ConnectionState::Idle(Vec::new()),
            fragment: None,
            max_message_size,
        }
    }

    fn connection_id(&self) -> Option<ConnectionId> {
        match self.state {
            ConnectionState::Idle(_) => None,
            ConnectionState::Connected(connection_id) => Some(connection_id),
        }
    }

    /// Adopts the identity and releases everything held back so far.
    fn connected(&mut self, connection_id: ConnectionId) -> Vec<ServerCommand> {
        let state = std::mem::replace(
            &mut self.state,
            ConnectionState::Connected(connection_id),
        );
        match state {
            ConnectionState::Idle(pending) => pending
                .into_iter()
                .map(|event| ServerCommand::ClientEvent {
                    from: connection_id,
                    event,
                })
                .collect(),
            ConnectionState::Connected(_) => Vec::new(),
        }
    }

    fn receive(&mut self, msg: ws::Message) -> Reaction {
        match msg {
            ws::Message::Ping(msg) => Reaction::Pong(msg),
            ws::Message::Text(text) => self.text(text.as_bytes()),
            ws::Message::Continuation(item) => self.continuation(item),
            ws::Message::Binary(bin) => {
                log::debug!("Ignoring binary frame ({} bytes)", bin.len());
                Reaction::Ignore
            }
            ws::Message::Close(reason) => Reaction::Close(reason),
            ws::Message::Pong(_) | ws::Message::Nop => Reaction::Ignore,
        }
    }

    fn text(&mut self, text: &[u8]) -> Reaction {
        let event = match serde_json::from_slice::<ClientEvent>(text) {
            Ok(event) => event,
            Err(err) => {
                log::warn!("Ignoring unparseable frame ({} bytes): {}", text.len(), err);
                return Reaction::Ignore;
            }
        };
        log::debug!("Ingress {}", event_name(&event));
        match self.state {
            ConnectionState::Idle(ref mut pending) => {
                pending.push(event);
                Reaction::Held
            }
            ConnectionState::Connected(from) => {
                Reaction::Forward(ServerCommand::ClientEvent { from, event })
            }
        }
    }

    fn continuation(&mut self, item: Item) -> Reaction {
        match item {
            Item::FirstText(bytes) => {
                self.fragment = Some(Fragment::Text(Vec::new()));
                self.append_fragment(&bytes).unwrap_or(Reaction::Ignore)
            }
            Item::FirstBinary(_) => {
                self.fragment = Some(Fragment::Binary);
                Reaction::Ignore
            }
            Item::Continue(bytes) => self.append_fragment(&bytes).unwrap_or(Reaction::Ignore),
            Item::Last(bytes) => {
                if let Some(close) = self.append_fragment(&bytes) {
                    return close;
                }
                match self.fragment.take() {
                    Some(Fragment::Text(text)) => self.text(&text),
                    Some(Fragment::Binary) | None => Reaction::Ignore,
                }
            }
        }
    }

    /// Returns a close reaction once the reassembled message grows too large.
    fn append_fragment(&mut self, bytes: &[u8]) -> Option<Reaction> {
        if let Some(Fragment::Text(buffer)) = &mut self.fragment {
            if buffer.len() + bytes.len() > self.max_message_size {
                log::warn!(
                    "Closing connection: message exceeds {} bytes",
                    self.max_message_size
                );
                self.fragment = None;
                return Some(Reaction::Close(Some(CloseReason::from(CloseCode::Size))));
            }
            buffer.extend_from_slice(bytes);
        }
        None
    }
}

fn event_name(event: &ClientEvent) -> &'static str {
    match event {
        ClientEvent::Drawing(_) => "drawing",
        ClientEvent::Image(_) => "image",
        ClientEvent::Text(_) => "text",
        ClientEvent::Undo => "undo",
        ClientEvent::Clear => "clear",
        ClientEvent::GuessRequest(_) => "guess_request",
    }
}

/// Pumps server events into the actor until either side goes away.
///
/// `forward` reports whether the actor is still alive. When it is not, the
/// identity seen so far is handed back to the server, which covers actors
/// that stopped before they learned their own identity.
async fn relay<F>(mut rx: UnboundedReceiver<ConnectionEvent>, srv_tx: ServerTx, mut forward: F)
where
    F: FnMut(ConnectionEvent) -> bool,
{
    log::debug!("connection green thread - started");
    let mut connection_id = None;
    while let Some(msg) = rx.recv().await {
        if let ConnectionEvent::Connected { connection_id: id } = &msg {
            connection_id = Some(*id);
        }
        if !forward(msg) {
            if let Some(from) = connection_id {
                if srv_tx.send(ServerCommand::Disconnect { from }).is_err() {
                    log::warn!("Server loop is gone, dropping command");
                }
            }
            break;
        }
    }
    log::debug!("connection green thread - terminated");
}

struct ConnectionActor {
    inbox: Inbox,
    srv_tx: ServerTx,
}

impl ConnectionActor {
    fn new(srv_tx: ServerTx, max_message_size: usize) -> Self {
        Self {
            inbox: Inbox::new(max_message_size),
            srv_tx,
        }
    }

    fn send_to_server(&self, command: ServerCommand) {
        if self.srv_tx.send(command).is_err() {
            log::warn!("Server loop is gone, dropping command");
        }
    }
}

impl Actor for ConnectionActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<ConnectionEvent>();

        self.send_to_server(ServerCommand::Connect { tx });

        let addr = ctx.address();

        tokio::spawn(relay(rx, self.srv_tx.clone(), move |msg| {
            if addr.connected() {
                addr.do_send(ConnectionActorMessage(msg));
                true
            } else {
                false
            }
        }));
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        if let Some(from) = self.inbox.connection_id() {
            self.send_to_server(ServerCommand::Disconnect { from });
        }

        Running::Stop
    }
}

/// Ingress
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ConnectionActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        let msg = match msg {
            Ok(msg) => msg,
            Err(err) => {
                log::warn!("Closing connection on protocol error: {}", err);
                let code = match err {
                    ws::ProtocolError::Overflow => CloseCode::Size,
                    _ => CloseCode::Protocol,
                };
                ctx.close(Some(CloseReason::from(code)));
                ctx.stop();
                return;
            }
        };
        match self.inbox.receive(msg) {
            Reaction::Forward(command) => self.send_to_server(command),
            Reaction::Held | Reaction::Ignore => (),
            Reaction::Pong(msg) => ctx.pong(&msg),
            Reaction::Close(reason) => {
                ctx.close(reason);
                ctx.stop();
            }
        }
    }
}

/// Egress
impl Handler<ConnectionActorMessage> for ConnectionActor {
    type Result = ();

    fn handle(
        &mut self,
        msg: ConnectionActorMessage,
        ctx: &mut ws::WebsocketContext<Self>,
    ) -> Self::Result {
        match msg.0 {
            ConnectionEvent::Connected { connection_id } => {
                for command in self.inbox.connected(connection_id) {
                    self.send_to_server(command);
                }
            }
            ConnectionEvent::Event(event) => match serde_json::to_string(event.as_ref()) {
                Ok(serialized) => {
                    log::debug!("Egress {} bytes", serialized.len());
                    ctx.text(serialized);
                }
                Err(err) => log::warn!("Failed to serialize event: {}", err),
            },
        }
    }
}

pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    srv_tx: web::Data<ServerTx>,
    config: web::Data<Config>,
) -> Result<HttpResponse, Error> {
    let max_message_size = config.max_message_size;
    ws::WsResponseBuilder::new(
        ConnectionActor::new(srv_tx.get_ref().clone(), max_message_size),
        &req,
        stream,
    )
    .frame_size(max_message_size)
    .start()
}

#[cfg(test)]
mod tests {
    use super::*;
    use system::serde_json::json;
    use system::uuid::Uuid;
    use tokio::sync::mpsc::unbounded_channel;

    fn text(frame: &'static str) -> ws::Message {
        ws::Message::Text(frame.into())
    }

    fn forwarded(reaction: Reaction) -> (ConnectionId, ClientEvent) {
        match reaction {
            Reaction::Forward(ServerCommand::ClientEvent { from, event }) => (from, event),
            other => panic!("expected a forwarded event, got {:?}", other),
        }
    }

    #[test]
    fn it_holds_events_until_identity_arrives() {
        let mut inbox = Inbox::new(1024);
        assert!(matches!(inbox.receive(text(r#"{"event":"undo"}"#)), Reaction::Held));
        assert!(matches!(inbox.receive(text(r#"{"event":"clear"}"#)), Reaction::Held));
        assert_eq!(inbox.connection_id(), None);

        let id = Uuid::new_v4();
        let flushed: Vec<_> = inbox
            .connected(id)
            .into_iter()
            .map(|command| match command {
                ServerCommand::ClientEvent { from, event } => {
                    assert_eq!(from, id);
                    event
                }
                other => panic!("unexpected command {:?}", other),
            })
            .collect();
        assert_eq!(flushed, vec![ClientEvent::Undo, ClientEvent::Clear]);
        assert_eq!(inbox.connection_id(), Some(id));

        let (from, event) = forwarded(inbox.receive(text(r#"{"event":"undo"}"#)));
        assert_eq!(from, id);
        assert_eq!(event, ClientEvent::Undo);
        assert!(inbox.connected(id).is_empty());
    }

    #[test]
    fn it_reassembles_continuation_frames() {
        let mut inbox = Inbox::new(1024);
        let id = Uuid::new_v4();
        inbox.connected(id);

        let parts = [
            Item::FirstText(Bytes::from_static(br#"{"event":"dra"#)),
            Item::Continue(Bytes::from_static(br#"wing","data":{"x0""#)),
        ];
        for part in parts {
            assert!(matches!(
                inbox.receive(ws::Message::Continuation(part)),
                Reaction::Ignore
            ));
        }
        let last = Item::Last(Bytes::from_static(b":1}}"));
        let (_, event) = forwarded(inbox.receive(ws::Message::Continuation(last)));
        match event {
            ClientEvent::Drawing(payload) => assert_eq!(payload["x0"], json!(1)),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn it_closes_on_oversized_message() {
        let mut inbox = Inbox::new(16);
        inbox.connected(Uuid::new_v4());

        let first = Item::FirstText(Bytes::from_static(b"0123456789"));
        assert!(matches!(
            inbox.receive(ws::Message::Continuation(first)),
            Reaction::Ignore
        ));
        let next = Item::Continue(Bytes::from_static(b"0123456789"));
        match inbox.receive(ws::Message::Continuation(next)) {
            Reaction::Close(Some(reason)) => assert_eq!(reason.code, CloseCode::Size),
            other => panic!("expected close, got {:?}", other),
        }
    }

    #[test]
    fn it_ignores_unparseable_and_binary_frames() {
        let mut inbox = Inbox::new(1024);
        let id = Uuid::new_v4();
        inbox.connected(id);

        assert!(matches!(inbox.receive(text("not json")), Reaction::Ignore));
        assert!(matches!(inbox.receive(text(r#"{"event":"redo"}"#)), Reaction::Ignore));
        assert!(matches!(
            inbox.receive(ws::Message::Binary(Bytes::from_static(b"\x00\x01"))),
            Reaction::Ignore
        ));
        for part in [
            Item::FirstBinary(Bytes::from_static(b"{")),
            Item::Last(Bytes::from_static(b"}")),
        ] {
            assert!(matches!(
                inbox.receive(ws::Message::Continuation(part)),
                Reaction::Ignore
            ));
        }

        let (from, event) = forwarded(inbox.receive(text(r#"{"event":"clear"}"#)));
        assert_eq!(from, id);
        assert_eq!(event, ClientEvent::Clear);
    }

    #[test]
    fn it_answers_ping_and_close() {
        let mut inbox = Inbox::new(1024);
        match inbox.receive(ws::Message::Ping(Bytes::from_static(b"hi"))) {
            Reaction::Pong(bytes) => assert_eq!(&bytes[..], b"hi"),
            other => panic!("expected pong, got {:?}", other),
        }
        assert!(matches!(
            inbox.receive(ws::Message::Close(None)),
            Reaction::Close(None)
        ));
    }

    #[tokio::test]
    async fn it_hands_identity_back_when_actor_is_gone() {
        let (tx, rx) = unbounded_channel();
        let (srv_tx, mut srv_rx) = unbounded_channel();
        let id = Uuid::new_v4();
        tx.send(ConnectionEvent::Connected { connection_id: id })
            .unwrap();

        relay(rx, srv_tx, |_| false).await;

        match srv_rx.recv().await {
            Some(ServerCommand::Disconnect { from }) => assert_eq!(from, id),
            other => panic!("expected disconnect, got {:?}", other),
        }
        // The relay dropped its receiver, so the server sees a closed channel.
        assert!(tx.send(ConnectionEvent::Connected { connection_id: id }).is_err());
    }

    #[tokio::test]
    async fn it_relays_until_server_drops_sender() {
        let (tx, rx) = unbounded_channel();
        let (srv_tx, mut srv_rx) = unbounded_channel();
        let id = Uuid::new_v4();
        tx.send(ConnectionEvent::Connected { connection_id: id })
            .unwrap();
        tx.send(ConnectionEvent::Event(Arc::new(ServerEvent::Clear)))
            .unwrap();
        drop(tx);

        let mut received = Vec::new();
        relay(rx, srv_tx, |msg| {
            received.push(msg);
            true
        })
        .await;

        assert_eq!(received.len(), 2);
        assert!(matches!(received[1], ConnectionEvent::Event(_)));
        assert!(srv_rx.recv().await.is_none());
    }
}
