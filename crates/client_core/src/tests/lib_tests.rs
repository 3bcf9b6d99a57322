use super::*;
use crate::transport::InboundSender;
use shared::{
    domain::{RoomId, SessionStatus},
    error::ValidationError,
    protocol::{ChatMessage, JoinedRoom, ServerEvent, StatusChange, WaitingCount},
};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

#[derive(Default)]
struct MockState {
    opened: Vec<String>,
    sent: Vec<ClientRequest>,
    closed: usize,
    inbound: Vec<InboundSender>,
    refuse_open: bool,
}

/// In-memory connector: records every request and lets the test play the
/// server by pushing events into the most recently opened link.
#[derive(Clone, Default)]
struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    fn refusing() -> Self {
        let connector = Self::default();
        connector.state.lock().expect("lock").refuse_open = true;
        connector
    }

    fn push(&self, event: TransportEvent) {
        let state = self.state.lock().expect("lock");
        let inbound = state.inbound.last().expect("a link was opened");
        inbound.send(event).expect("client still listening");
    }

    fn push_server(&self, event: ServerEvent) {
        self.push(TransportEvent::Server(event));
    }

    fn sent(&self) -> Vec<ClientRequest> {
        self.state.lock().expect("lock").sent.clone()
    }

    fn opened(&self) -> usize {
        self.state.lock().expect("lock").opened.len()
    }

    fn closed(&self) -> usize {
        self.state.lock().expect("lock").closed
    }

    fn inbound(&self, index: usize) -> InboundSender {
        self.state.lock().expect("lock").inbound[index].clone()
    }
}

struct MockLink {
    state: Arc<Mutex<MockState>>,
}

impl TransportLink for MockLink {
    fn emit(&mut self, request: ClientRequest) -> Result<(), TransportError> {
        self.state.lock().expect("lock").sent.push(request);
        Ok(())
    }

    fn close(&mut self) {
        self.state.lock().expect("lock").closed += 1;
    }
}

impl Connector for MockConnector {
    type Link = MockLink;

    fn open(
        &mut self,
        endpoint: &Endpoint,
        inbound: InboundSender,
    ) -> Result<Self::Link, TransportError> {
        let mut state = self.state.lock().expect("lock");
        if state.refuse_open {
            return Err(TransportError::NoRuntime);
        }
        state.opened.push(endpoint.to_string());
        state.inbound.push(inbound);
        Ok(MockLink {
            state: Arc::clone(&self.state),
        })
    }
}

fn client() -> (MatchClient<MockConnector>, MockConnector) {
    let connector = MockConnector::default();
    let endpoint = Endpoint::parse("http://localhost:3010").expect("endpoint");
    (MatchClient::new(connector.clone(), endpoint), connector)
}

fn status_change(status: SessionStatus) -> ServerEvent {
    ServerEvent::StatusChange(StatusChange { status })
}

fn joined_room(room_id: &str, participants: &[&str]) -> ServerEvent {
    ServerEvent::JoinedRoom(JoinedRoom {
        room_id: RoomId::new(room_id),
        participants: participants.iter().map(|p| p.to_string()).collect(),
    })
}

fn new_message(nickname: &str, message: &str) -> ServerEvent {
    ServerEvent::NewMessage(ChatMessage {
        nickname: nickname.to_string(),
        message: message.to_string(),
    })
}

/// Connects as alice and walks the session into `status`.
fn client_in(status: SessionStatus) -> (MatchClient<MockConnector>, MockConnector) {
    let (mut client, server) = client();
    client.connect("alice").expect("connect");
    if status != SessionStatus::Disconnected {
        server.push(TransportEvent::Connected);
    }
    match status {
        SessionStatus::Disconnected | SessionStatus::Connected => {}
        SessionStatus::Waiting | SessionStatus::Matched => {
            server.push_server(status_change(status));
        }
        SessionStatus::InRoom => server.push_server(joined_room("r1", &["alice", "bob"])),
    }
    client.drain_pending();
    assert_eq!(client.session().status(), status);
    (client, server)
}

#[test]
fn connect_waits_for_transport_before_reporting_connected() {
    let (mut client, server) = client();

    client.connect("alice").expect("connect");
    assert_eq!(server.opened(), 1);
    assert!(client.has_transport());
    assert_eq!(client.session().status(), SessionStatus::Disconnected);

    server.push(TransportEvent::Connected);
    assert_eq!(client.drain_pending().len(), 1);
    assert_eq!(client.session().status(), SessionStatus::Connected);
    assert_eq!(
        client.session().nickname().map(|n| n.as_str()),
        Some("alice")
    );
}

#[test]
fn connect_rejects_blank_nickname_without_touching_transport() {
    let (mut client, server) = client();

    for nickname in ["", "   ", "\t\n"] {
        let err = client.connect(nickname).expect_err("blank nickname");
        assert!(matches!(
            err,
            SessionError::Validation(ValidationError::EmptyNickname)
        ));
    }

    assert_eq!(server.opened(), 0);
    assert!(!client.has_transport());
    assert_eq!(client.session().status(), SessionStatus::Disconnected);
}

#[test]
fn connect_twice_requires_disconnect_first() {
    let (mut client, server) = client_in(SessionStatus::Connected);

    let err = client.connect("bob").expect_err("already connected");
    assert!(matches!(err, SessionError::AlreadyConnected));
    assert_eq!(server.opened(), 1);
    assert_eq!(
        client.session().nickname().map(|n| n.as_str()),
        Some("alice")
    );
}

#[test]
fn connect_while_handshake_pending_is_rejected() {
    let (mut client, server) = client();
    client.connect("alice").expect("connect");

    assert!(matches!(
        client.connect("alice"),
        Err(SessionError::AlreadyConnected)
    ));
    assert_eq!(server.opened(), 1);
}

#[test]
fn connector_failure_surfaces_as_transport_error() {
    let endpoint = Endpoint::parse("http://localhost:3010").expect("endpoint");
    let mut client = MatchClient::new(MockConnector::refusing(), endpoint);

    let err = client.connect("alice").expect_err("refused");
    assert!(matches!(err, SessionError::Transport(_)));
    assert!(!client.has_transport());
    assert!(client.session().nickname().is_none());
}

#[test]
fn waiting_count_is_recorded_while_connected() {
    let (mut client, server) = client_in(SessionStatus::Connected);

    server.push_server(ServerEvent::WaitingCount(WaitingCount { count: 3 }));
    client.drain_pending();

    assert_eq!(client.session().waiting_count(), 3);
    assert_eq!(client.session().status(), SessionStatus::Connected);
}

#[test]
fn matched_then_joined_room_enters_room() {
    let (mut client, server) = client_in(SessionStatus::Waiting);

    server.push_server(ServerEvent::Matched);
    server.push_server(joined_room("r1", &["alice", "bob"]));
    assert_eq!(client.drain_pending().len(), 2);

    let session = client.session();
    assert_eq!(session.status(), SessionStatus::InRoom);
    assert_eq!(session.room_id(), Some(&RoomId::new("r1")));
    assert_eq!(
        session.participants(),
        Some(&["alice".to_string(), "bob".to_string()][..])
    );
    assert!(session.messages().is_empty());
}

#[test]
fn echoed_message_is_appended() {
    let (mut client, server) = client_in(SessionStatus::InRoom);

    server.push_server(new_message("bob", "hi"));
    client.drain_pending();

    assert_eq!(
        client.session().messages(),
        &[ChatMessage {
            nickname: "bob".to_string(),
            message: "hi".to_string(),
        }]
    );
}

#[test]
fn blank_message_sends_nothing_and_changes_nothing() {
    let (mut client, server) = client_in(SessionStatus::InRoom);
    let before = client.session().clone();

    let err = client.send_message("  ").expect_err("blank message");

    assert!(matches!(
        err,
        SessionError::Validation(ValidationError::EmptyMessage)
    ));
    assert!(server.sent().is_empty());
    assert_eq!(client.session(), &before);
}

#[test]
fn sent_message_is_not_echoed_locally() {
    let (mut client, server) = client_in(SessionStatus::InRoom);

    let dispatch = client.send_message(" hello ").expect("send");

    assert_eq!(dispatch, Dispatch::Sent);
    assert_eq!(
        server.sent(),
        vec![ClientRequest::SendMessage(SendMessage {
            message: " hello ".to_string(),
            nickname: "alice".to_string(),
        })]
    );
    assert!(client.session().messages().is_empty());

    server.push_server(new_message("alice", " hello "));
    client.drain_pending();
    assert_eq!(client.session().messages().len(), 1);
    assert!(client.session().is_own(&client.session().messages()[0]));
}

#[test]
fn messages_follow_server_order_not_send_order() {
    let (mut client, server) = client_in(SessionStatus::InRoom);

    client.send_message("mine").expect("send");
    server.push_server(new_message("bob", "theirs"));
    server.push_server(new_message("alice", "mine"));
    client.drain_pending();

    let order: Vec<&str> = client
        .session()
        .messages()
        .iter()
        .map(|m| m.message.as_str())
        .collect();
    assert_eq!(order, vec!["theirs", "mine"]);
}

#[test]
fn join_queue_is_forwarded_in_every_connected_state() {
    for status in [
        SessionStatus::Connected,
        SessionStatus::Waiting,
        SessionStatus::Matched,
        SessionStatus::InRoom,
    ] {
        let (mut client, server) = client_in(status);

        assert_eq!(client.join_queue(), Dispatch::Sent, "from {status}");
        assert_eq!(
            server.sent(),
            vec![ClientRequest::JoinQueue(JoinQueue {
                nickname: "alice".to_string(),
            })]
        );
        assert_eq!(client.session().status(), status);
    }
}

#[test]
fn join_queue_is_forwarded_before_handshake_completes() {
    let (mut client, server) = client();
    client.connect("alice").expect("connect");

    assert_eq!(client.join_queue(), Dispatch::Sent);
    assert_eq!(server.sent().len(), 1);
}

#[test]
fn intents_without_transport_go_nowhere() {
    let (mut client, _server) = client();

    assert_eq!(client.join_queue(), Dispatch::NoTransport);
    assert_eq!(client.send_message("hi").expect("valid"), Dispatch::NoTransport);
}

#[test]
fn disconnect_resets_from_every_state() {
    for status in SessionStatus::ALL {
        let (mut client, server) = client_in(status);
        if status.is_connected() {
            server.push_server(ServerEvent::WaitingCount(WaitingCount { count: 4 }));
        }
        if status == SessionStatus::InRoom {
            server.push_server(new_message("bob", "hi"));
        }
        client.drain_pending();

        client.disconnect();

        let session = client.session();
        assert_eq!(session.status(), SessionStatus::Disconnected, "from {status}");
        assert_eq!(session.waiting_count(), 0);
        assert!(session.room().is_none());
        assert!(session.messages().is_empty());
        assert!(!client.has_transport());
        assert_eq!(server.closed(), 1);
    }
}

#[test]
fn disconnect_is_idempotent_and_safe_without_transport() {
    let (mut client, server) = client();
    assert_eq!(client.disconnect(), Applied::Unchanged);

    client.connect("alice").expect("connect");
    server.push(TransportEvent::Connected);
    client.drain_pending();

    assert_eq!(
        client.disconnect(),
        Applied::Transition {
            from: SessionStatus::Connected,
            to: SessionStatus::Disconnected,
        }
    );
    assert_eq!(client.disconnect(), Applied::Unchanged);
    assert_eq!(server.closed(), 1);
}

#[test]
fn transport_drop_in_room_clears_messages() {
    let (mut client, server) = client_in(SessionStatus::InRoom);
    server.push_server(new_message("bob", "hi"));
    client.drain_pending();
    assert_eq!(client.session().messages().len(), 1);

    server.push(TransportEvent::Disconnected);
    client.drain_pending();

    assert_eq!(client.session().status(), SessionStatus::Disconnected);
    assert!(client.session().messages().is_empty());
    assert!(!client.has_transport());
}

#[test]
fn server_reported_disconnect_releases_the_link() {
    let (mut client, server) = client_in(SessionStatus::Waiting);

    server.push_server(status_change(SessionStatus::Disconnected));
    server.push_server(ServerEvent::WaitingCount(WaitingCount { count: 4 }));
    let updates = client.drain_pending();

    assert_eq!(updates.len(), 1);
    assert_eq!(client.session().status(), SessionStatus::Disconnected);
    assert!(client.session().can_edit_nickname());
    assert!(!client.has_transport());
    assert_eq!(server.closed(), 1);
    assert_eq!(client.join_queue(), Dispatch::NoTransport);
}

#[test]
fn connect_is_accepted_after_server_reported_disconnect() {
    let (mut client, server) = client_in(SessionStatus::Connected);
    server.push_server(status_change(SessionStatus::Disconnected));
    client.drain_pending();

    client.connect("bob").expect("reconnect");
    server.push(TransportEvent::Connected);
    server.push_server(ServerEvent::WaitingCount(WaitingCount { count: 4 }));
    client.drain_pending();

    assert_eq!(server.opened(), 2);
    assert_eq!(client.session().status(), SessionStatus::Connected);
    assert_eq!(client.session().waiting_count(), 4);
    assert_eq!(client.session().nickname().map(|n| n.as_str()), Some("bob"));
}

#[test]
fn drain_returns_every_update_beyond_the_broadcast_buffer() {
    let (mut client, server) = client_in(SessionStatus::Connected);
    let total = EVENT_BUFFER as u32 + 10;
    for count in 1..=total {
        server.push_server(ServerEvent::WaitingCount(WaitingCount { count }));
    }

    let updates = client.drain_pending();

    assert_eq!(updates.len(), total as usize);
    assert!(updates.iter().all(|update| update.applied == Applied::Updated));
    assert_eq!(client.session().waiting_count(), total);
}

#[test]
fn events_are_applied_in_arrival_order() {
    let (mut client, server) = client_in(SessionStatus::Connected);

    server.push_server(status_change(SessionStatus::Waiting));
    server.push_server(ServerEvent::WaitingCount(WaitingCount { count: 5 }));
    server.push_server(status_change(SessionStatus::Connected));
    server.push_server(ServerEvent::WaitingCount(WaitingCount { count: 2 }));

    let mut rx = client.subscribe();
    assert_eq!(client.drain_pending().len(), 4);

    let mut seen = Vec::new();
    while let Ok(update) = rx.try_recv() {
        seen.push(update.event);
    }
    assert_eq!(seen.len(), 4);
    assert_eq!(client.session().status(), SessionStatus::Connected);
    assert_eq!(client.session().waiting_count(), 2);
}

#[test]
fn events_after_transport_loss_stay_queued_for_nobody() {
    let (mut client, server) = client_in(SessionStatus::Waiting);

    server.push(TransportEvent::Disconnected);
    server.push_server(status_change(SessionStatus::Matched));

    assert_eq!(client.drain_pending().len(), 1);
    assert_eq!(client.session().status(), SessionStatus::Disconnected);
}

#[test]
fn stale_link_cannot_touch_a_new_session() {
    let (mut client, server) = client_in(SessionStatus::InRoom);
    let stale = server.inbound(0);

    client.disconnect();
    client.connect("carol").expect("reconnect");
    server.push(TransportEvent::Connected);

    assert!(stale
        .send(TransportEvent::Server(new_message("bob", "old room")))
        .is_err());
    client.drain_pending();

    assert_eq!(client.session().status(), SessionStatus::Connected);
    assert!(client.session().messages().is_empty());
    assert_eq!(
        client.session().nickname().map(|n| n.as_str()),
        Some("carol")
    );
}

#[test]
fn subscribers_see_each_applied_event() {
    let (mut client, server) = client_in(SessionStatus::Connected);
    let mut rx = client.subscribe();

    server.push_server(ServerEvent::Matched);
    client.drain_pending();

    let update = rx.try_recv().expect("update published");
    assert_eq!(update.event, TransportEvent::Server(ServerEvent::Matched));
    assert_eq!(
        update.applied,
        Applied::Transition {
            from: SessionStatus::Connected,
            to: SessionStatus::Matched,
        }
    );
}

#[tokio::test]
async fn next_event_applies_one_event_at_a_time() {
    let (mut client, server) = client();
    client.connect("alice").expect("connect");
    server.push(TransportEvent::Connected);
    server.push_server(ServerEvent::WaitingCount(WaitingCount { count: 1 }));

    let first = tokio::time::timeout(Duration::from_secs(1), client.next_event())
        .await
        .expect("no timeout")
        .expect("event");
    assert_eq!(first.event, TransportEvent::Connected);
    assert_eq!(client.session().waiting_count(), 0);

    let second = tokio::time::timeout(Duration::from_secs(1), client.next_event())
        .await
        .expect("no timeout")
        .expect("event");
    assert_eq!(second.applied, Applied::Updated);
    assert_eq!(client.session().waiting_count(), 1);
}

#[tokio::test]
async fn next_event_is_none_without_transport() {
    let (mut client, _server) = client();
    assert!(client.next_event().await.is_none());
}
