//! Session record and its transition function.
//!
//! [`Session::apply`] is the only place session data changes in response to
//! the transport. It is pure: no I/O, no clock, one event at a time.

use shared::{
    domain::{Nickname, RoomId, SessionStatus},
    protocol::{ChatMessage, JoinedRoom, ServerEvent},
};
use tracing::{debug, warn};

use crate::transport::TransportEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub id: RoomId,
    pub participants: Vec<String>,
}

/// What applying an event did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Transition {
        from: SessionStatus,
        to: SessionStatus,
    },
    /// Status unchanged, data changed.
    Updated,
    Unchanged,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    nickname: Option<Nickname>,
    status: SessionStatus,
    waiting_count: u32,
    room: Option<Room>,
    messages: Vec<ChatMessage>,
}

impl Session {
    pub fn new(nickname: Nickname) -> Self {
        Self {
            nickname: Some(nickname),
            ..Self::default()
        }
    }

    pub fn nickname(&self) -> Option<&Nickname> {
        self.nickname.as_ref()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn waiting_count(&self) -> u32 {
        self.waiting_count
    }

    pub fn room(&self) -> Option<&Room> {
        self.room.as_ref()
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        self.room.as_ref().map(|room| &room.id)
    }

    pub fn participants(&self) -> Option<&[String]> {
        self.room.as_ref().map(|room| room.participants.as_slice())
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn can_edit_nickname(&self) -> bool {
        self.status == SessionStatus::Disconnected
    }

    /// Whether a front end should offer "join queue". The client itself
    /// forwards the intent in any state.
    pub fn can_join_queue(&self) -> bool {
        self.status == SessionStatus::Connected
    }

    pub fn can_chat(&self) -> bool {
        self.status == SessionStatus::InRoom
    }

    pub fn is_own(&self, message: &ChatMessage) -> bool {
        self.nickname
            .as_ref()
            .is_some_and(|nickname| nickname.as_str() == message.nickname)
    }

    pub fn apply(&mut self, event: &TransportEvent) -> Applied {
        match event {
            TransportEvent::Connected => self.enter(SessionStatus::Connected),
            TransportEvent::Disconnected => self.reset(),
            TransportEvent::Server(event) => self.apply_server(event),
        }
    }

    /// Drops everything but the nickname.
    pub fn reset(&mut self) -> Applied {
        let from = self.status;
        let had_data = self.waiting_count != 0 || self.room.is_some() || !self.messages.is_empty();
        self.status = SessionStatus::Disconnected;
        self.waiting_count = 0;
        self.room = None;
        self.messages.clear();

        if from != SessionStatus::Disconnected {
            Applied::Transition {
                from,
                to: SessionStatus::Disconnected,
            }
        } else if had_data {
            Applied::Updated
        } else {
            Applied::Unchanged
        }
    }

    fn apply_server(&mut self, event: &ServerEvent) -> Applied {
        // statusChange is authoritative from any state; every other event
        // presumes a live session.
        if self.status == SessionStatus::Disconnected
            && !matches!(event, ServerEvent::StatusChange(_))
        {
            warn!(event = event.name(), "ignoring server event while disconnected");
            return Applied::Unchanged;
        }

        match event {
            ServerEvent::StatusChange(change) => self.enter(change.status),
            ServerEvent::WaitingCount(update) => {
                debug!(count = update.count, "waiting pool size updated");
                if self.waiting_count == update.count {
                    return Applied::Unchanged;
                }
                self.waiting_count = update.count;
                Applied::Updated
            }
            ServerEvent::Matched => self.enter(SessionStatus::Matched),
            ServerEvent::JoinedRoom(joined) => self.join_room(joined),
            ServerEvent::NewMessage(message) => {
                if self.status != SessionStatus::InRoom {
                    warn!(
                        status = %self.status,
                        from = %message.nickname,
                        "dropping chat message received outside a room"
                    );
                    return Applied::Unchanged;
                }
                self.messages.push(message.clone());
                Applied::Updated
            }
        }
    }

    fn join_room(&mut self, joined: &JoinedRoom) -> Applied {
        let from = self.status;
        debug!(
            room_id = %joined.room_id,
            participants = joined.participants.len(),
            "joined room"
        );
        self.status = SessionStatus::InRoom;
        self.room = Some(Room {
            id: joined.room_id.clone(),
            participants: joined.participants.clone(),
        });
        self.messages.clear();

        if from == SessionStatus::InRoom {
            Applied::Updated
        } else {
            Applied::Transition {
                from,
                to: SessionStatus::InRoom,
            }
        }
    }

    /// Moves to `to` verbatim, shedding data that only exists in later states.
    fn enter(&mut self, to: SessionStatus) -> Applied {
        if to == SessionStatus::Disconnected {
            return self.reset();
        }

        let from = self.status;
        let had_room = self.room.is_some() || !self.messages.is_empty();
        self.status = to;
        if to != SessionStatus::InRoom {
            self.room = None;
            self.messages.clear();
        }

        if from != to {
            Applied::Transition { from, to }
        } else if had_room && to != SessionStatus::InRoom {
            Applied::Updated
        } else {
            Applied::Unchanged
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
