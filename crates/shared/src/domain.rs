use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

macro_rules! name_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

name_newtype!(Nickname);
name_newtype!(RoomId);

impl Nickname {
    /// Accepts any nickname with at least one non-whitespace character.
    ///
    /// The value is kept exactly as typed; the server sees and echoes the
    /// same string, which is what own-message detection compares against.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        if raw.trim().is_empty() {
            return Err(ValidationError::EmptyNickname);
        }
        Ok(Self(raw.to_string()))
    }
}

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

/// Rejects chat text that is empty after trimming.
pub fn validate_message(text: &str) -> Result<&str, ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    Ok(text)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    #[default]
    Disconnected,
    Connected,
    Waiting,
    Matched,
    InRoom,
}

impl SessionStatus {
    pub const ALL: [SessionStatus; 5] = [
        SessionStatus::Disconnected,
        SessionStatus::Connected,
        SessionStatus::Waiting,
        SessionStatus::Matched,
        SessionStatus::InRoom,
    ];

    /// Name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Disconnected => "DISCONNECTED",
            SessionStatus::Connected => "CONNECTED",
            SessionStatus::Waiting => "WAITING",
            SessionStatus::Matched => "MATCHED",
            SessionStatus::InRoom => "IN_ROOM",
        }
    }

    /// Short human-readable label for status displays.
    pub fn label(self) -> &'static str {
        match self {
            SessionStatus::Disconnected => "not connected",
            SessionStatus::Connected => "connected",
            SessionStatus::Waiting => "waiting",
            SessionStatus::Matched => "matched",
            SessionStatus::InRoom => "in chat room",
        }
    }

    pub fn is_connected(self) -> bool {
        self != SessionStatus::Disconnected
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nickname_rejects_blank_input() {
        assert_eq!(Nickname::parse(""), Err(ValidationError::EmptyNickname));
        assert_eq!(Nickname::parse(" \t\n"), Err(ValidationError::EmptyNickname));
    }

    #[test]
    fn nickname_keeps_value_as_typed() {
        let nickname = Nickname::parse(" alice ").expect("valid");
        assert_eq!(nickname.as_str(), " alice ");
    }

    #[test]
    fn message_validation_requires_visible_text() {
        assert_eq!(validate_message("   "), Err(ValidationError::EmptyMessage));
        assert_eq!(validate_message(" hi "), Ok(" hi "));
    }

    #[test]
    fn status_serializes_to_screaming_names() {
        for status in SessionStatus::ALL {
            let encoded = serde_json::to_string(&status).expect("encode");
            assert_eq!(encoded, format!("\"{}\"", status.as_str()));
        }
    }
}
