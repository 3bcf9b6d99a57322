use std::io::{self, Write};

use client_core::{Connector, Dispatch, MatchClient, SessionError, SessionUpdate};
use tracing::warn;

use crate::{
    command::{Command, HELP},
    view,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Terminal front end: turns typed commands into session intents and
/// prints whatever changed.
pub struct App<C: Connector> {
    client: MatchClient<C>,
    default_nickname: Option<String>,
}

impl<C: Connector> App<C> {
    pub fn new(client: MatchClient<C>, default_nickname: Option<String>) -> Self {
        Self {
            client,
            default_nickname,
        }
    }

    pub fn client(&self) -> &MatchClient<C> {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut MatchClient<C> {
        &mut self.client
    }

    pub fn handle_command(&mut self, command: Command, out: &mut impl Write) -> io::Result<Flow> {
        match command {
            Command::Connect(nickname) => {
                let Some(nickname) = nickname.or_else(|| self.default_nickname.clone()) else {
                    writeln!(out, "usage: /connect <nickname>")?;
                    return Ok(Flow::Continue);
                };
                self.connect(&nickname, out)?;
            }
            Command::Disconnect => {
                self.client.disconnect();
                writeln!(out, "{}", view::status_line(self.client.session()))?;
            }
            Command::JoinQueue => {
                let session = self.client.session();
                if session.status().is_connected() && !session.can_join_queue() {
                    writeln!(out, "note: already {}", session.status().label())?;
                }
                if self.client.join_queue() == Dispatch::NoTransport {
                    writeln!(out, "not connected; use /connect <nickname>")?;
                }
            }
            Command::Status => {
                let session = self.client.session();
                writeln!(out, "{}", view::status_line(session))?;
                if let Some(room) = view::room_line(session) {
                    writeln!(out, "{room}")?;
                }
            }
            Command::Help => writeln!(out, "{HELP}")?,
            Command::Quit => return Ok(Flow::Quit),
            Command::Say(text) => self.say(&text, out)?,
            Command::Unknown(name) => writeln!(out, "unknown command /{name}; try /help")?,
        }
        Ok(Flow::Continue)
    }

    pub fn show_update(&self, update: &SessionUpdate, out: &mut impl Write) -> io::Result<()> {
        if let Some(text) = view::describe(update, self.client.session()) {
            writeln!(out, "{text}")?;
        }
        Ok(())
    }

    /// Applies everything already queued and prints it.
    pub fn flush_pending(&mut self, out: &mut impl Write) -> io::Result<()> {
        for update in self.client.drain_pending() {
            self.show_update(&update, out)?;
        }
        Ok(())
    }

    fn connect(&mut self, nickname: &str, out: &mut impl Write) -> io::Result<()> {
        match self.client.connect(nickname) {
            Ok(()) => writeln!(out, "connecting to {} as {nickname}", self.client.endpoint()),
            Err(SessionError::Validation(err)) => writeln!(out, "{err}"),
            Err(SessionError::AlreadyConnected) => {
                writeln!(out, "already connected; /disconnect first")
            }
            Err(err) => {
                warn!(error = %err, "connect failed");
                writeln!(out, "connect failed: {err}")
            }
        }
    }

    fn say(&mut self, text: &str, out: &mut impl Write) -> io::Result<()> {
        if !self.client.session().can_chat() {
            return writeln!(out, "not in a chat room; /join to find a partner");
        }
        match self.client.send_message(text) {
            Ok(Dispatch::Sent) => Ok(()),
            Ok(Dispatch::NoTransport) => writeln!(out, "not connected"),
            Err(err) => writeln!(out, "{err}"),
        }
    }
}

#[cfg(test)]
#[path = "tests/app_tests.rs"]
mod tests;
