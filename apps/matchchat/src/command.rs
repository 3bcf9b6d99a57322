//! Parsing of terminal input lines.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/connect [nickname]`; without a nickname the configured one is used.
    Connect(Option<String>),
    Disconnect,
    JoinQueue,
    Status,
    Help,
    Quit,
    /// Anything that is not a command is chat text, kept as typed.
    Say(String),
    Unknown(String),
}

pub const HELP: &str = "\
commands:
  /connect [nickname]  connect to the matching service
  /disconnect          leave and reset the session
  /join                join the waiting queue
  /status              show the current session
  /quit                exit
anything else is sent as a chat message (start with // to send a leading /)";

/// Returns `None` for blank lines.
pub fn parse(line: &str) -> Option<Command> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(escaped) = trimmed.strip_prefix("//") {
        return Some(Command::Say(format!("/{escaped}")));
    }
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Some(Command::Say(line.trim_end_matches(['\r', '\n']).to_string()));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, Some(arg.trim()).filter(|arg| !arg.is_empty())),
        None => (rest, None),
    };
    let command = match name {
        "connect" => Command::Connect(arg.map(str::to_string)),
        "disconnect" => Command::Disconnect,
        "join" => Command::JoinQueue,
        "status" => Command::Status,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    };
    Some(command)
}
