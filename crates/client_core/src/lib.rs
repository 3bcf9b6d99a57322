use shared::{
    domain::{validate_message, Nickname, SessionStatus},
    protocol::{ClientRequest, JoinQueue, SendMessage, ServerEvent},
};
use tokio::sync::{broadcast, mpsc, mpsc::error::TryRecvError};
use tracing::{debug, info, warn};

pub mod error;
pub mod session;
pub mod socket_io;
pub mod transport;

pub use error::{SessionError, TransportError};
pub use session::{Applied, Room, Session};
pub use transport::{Connector, Endpoint, TransportEvent, TransportLink};
pub use socket_io::{SocketIoConnector, SocketIoLink};

const EVENT_BUFFER: usize = 256;

/// Outcome of forwarding an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Sent,
    NoTransport,
}

/// One inbound event after it has been applied to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUpdate {
    pub event: TransportEvent,
    pub applied: Applied,
}

struct ActiveLink<L> {
    link: L,
    inbound: transport::InboundReceiver,
}

/// Client-side matchmaking session.
///
/// Owns the connector for its whole lifetime and at most one live link at a
/// time. Inbound events are only applied when the owner drains them through
/// [`MatchClient::next_event`] or [`MatchClient::drain_pending`], so each one
/// runs to completion before the next is looked at.
pub struct MatchClient<C: Connector> {
    connector: C,
    endpoint: Endpoint,
    session: Session,
    active: Option<ActiveLink<C::Link>>,
    events: broadcast::Sender<SessionUpdate>,
}

impl<C: Connector> MatchClient<C> {
    pub fn new(connector: C, endpoint: Endpoint) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            connector,
            endpoint,
            session: Session::default(),
            active: None,
            events,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// True while a link is held, including before the handshake completes.
    pub fn has_transport(&self) -> bool {
        self.active.is_some()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.events.subscribe()
    }

    /// Opens a fresh link for `nickname`. The status stays `DISCONNECTED`
    /// until the transport reports the handshake.
    pub fn connect(&mut self, nickname: &str) -> Result<(), SessionError> {
        let nickname = Nickname::parse(nickname)?;
        if self.active.is_some() || self.session.status().is_connected() {
            return Err(SessionError::AlreadyConnected);
        }

        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let link = self.connector.open(&self.endpoint, inbound_tx)?;
        info!(nickname = %nickname, endpoint = %self.endpoint, "opening session");
        self.session = Session::new(nickname);
        self.active = Some(ActiveLink { link, inbound });
        Ok(())
    }

    /// Tears down the link, if any, and resets the session. Events still
    /// queued from the old link are discarded with it.
    pub fn disconnect(&mut self) -> Applied {
        if let Some(mut active) = self.active.take() {
            info!(status = %self.session.status(), "closing session");
            active.link.close();
        }
        let applied = self.session.reset();
        if applied != Applied::Unchanged {
            self.publish(SessionUpdate {
                event: TransportEvent::Disconnected,
                applied,
            });
        }
        applied
    }

    /// Asks the server for a place in the waiting pool.
    ///
    /// Sent whenever a link is held, whatever the current status; the server
    /// decides whether the request is legal.
    pub fn join_queue(&mut self) -> Dispatch {
        let Some(nickname) = self.session.nickname().cloned() else {
            return Dispatch::NoTransport;
        };
        if !self.session.can_join_queue() {
            debug!(status = %self.session.status(), "forwarding joinQueue outside CONNECTED");
        }
        self.emit(ClientRequest::JoinQueue(JoinQueue {
            nickname: nickname.into_string(),
        }))
    }

    /// Sends chat text as typed. Nothing is added to the local log; the
    /// message shows up when the server echoes it back.
    pub fn send_message(&mut self, text: &str) -> Result<Dispatch, SessionError> {
        let message = validate_message(text)?;
        let Some(nickname) = self.session.nickname() else {
            return Ok(Dispatch::NoTransport);
        };
        let request = ClientRequest::SendMessage(SendMessage {
            message: message.to_string(),
            nickname: nickname.as_str().to_string(),
        });
        Ok(self.emit(request))
    }

    /// Waits for the next inbound event and applies it. Returns `None` when
    /// no link is held.
    pub async fn next_event(&mut self) -> Option<SessionUpdate> {
        let active = self.active.as_mut()?;
        // a link that vanished without saying goodbye is a disconnect
        let event = active
            .inbound
            .recv()
            .await
            .unwrap_or(TransportEvent::Disconnected);
        Some(self.handle(event))
    }

    /// Applies every event already queued, without waiting, and returns
    /// them in arrival order.
    pub fn drain_pending(&mut self) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();
        while let Some(active) = self.active.as_mut() {
            let event = match active.inbound.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => TransportEvent::Disconnected,
            };
            updates.push(self.handle(event));
        }
        updates
    }

    fn handle(&mut self, event: TransportEvent) -> SessionUpdate {
        let applied = self.session.apply(&event);
        if ends_session(&event) {
            if let Some(mut active) = self.active.take() {
                active.link.close();
                info!("transport closed");
            }
        }
        debug!(?applied, status = %self.session.status(), "inbound event applied");

        let update = SessionUpdate { event, applied };
        self.publish(update.clone());
        update
    }

    fn emit(&mut self, request: ClientRequest) -> Dispatch {
        let Some(active) = self.active.as_mut() else {
            debug!(event = request.name(), "no transport; request dropped");
            return Dispatch::NoTransport;
        };
        match active.link.emit(request) {
            Ok(()) => Dispatch::Sent,
            Err(err) => {
                warn!(error = %err, "failed to forward request");
                Dispatch::NoTransport
            }
        }
    }

    fn publish(&self, update: SessionUpdate) {
        // no subscribers is fine
        let _ = self.events.send(update);
    }
}

/// Events after which the session no longer needs its link: the transport
/// going away, or the server declaring the session over.
fn ends_session(event: &TransportEvent) -> bool {
    match event {
        TransportEvent::Disconnected => true,
        TransportEvent::Server(ServerEvent::StatusChange(change)) => {
            change.status == SessionStatus::Disconnected
        }
        _ => false,
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
