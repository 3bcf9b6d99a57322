//! Text rendering of session state for the terminal.

use client_core::{Applied, Session, SessionUpdate, TransportEvent};
use shared::protocol::{ChatMessage, ServerEvent};

pub fn status_line(session: &Session) -> String {
    let status = session.status();
    let mut line = format!("status: {} ({})", status.label(), status);
    if status.is_connected() {
        line.push_str(&format!(" | waiting: {}", session.waiting_count()));
    }
    line
}

pub fn room_line(session: &Session) -> Option<String> {
    let room = session.room()?;
    Some(format!(
        "room {} with {}",
        room.id,
        room.participants.join(", ")
    ))
}

pub fn message_line(session: &Session, message: &ChatMessage) -> String {
    if session.is_own(message) {
        format!("{:>40}", format!("{}: {} <", message.nickname, message.message))
    } else {
        format!("> {}: {}", message.nickname, message.message)
    }
}

/// Everything worth printing after `update` was applied.
pub fn describe(update: &SessionUpdate, session: &Session) -> Option<String> {
    if update.applied == Applied::Unchanged {
        return None;
    }
    match &update.event {
        TransportEvent::Server(ServerEvent::NewMessage(message)) => {
            Some(message_line(session, message))
        }
        TransportEvent::Server(ServerEvent::JoinedRoom(_)) => {
            let mut text = status_line(session);
            if let Some(room) = room_line(session) {
                text.push('\n');
                text.push_str(&room);
            }
            Some(text)
        }
        TransportEvent::Server(ServerEvent::WaitingCount(update)) => {
            Some(format!("waiting: {}", update.count))
        }
        _ => Some(status_line(session)),
    }
}
