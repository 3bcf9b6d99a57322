//! Wire format of the matching service: Socket.IO v4 packets inside
//! Engine.IO v4 text frames, one packet per WebSocket text frame.
//!
//! `2` is an engine ping, `40` opens the default namespace and
//! `42["statusChange",{"status":"WAITING"}]` is a named event on it.
//! Binary attachments and the long-polling transport are not supported.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::{RoomId, SessionStatus},
    error::ProtocolError,
};

/// Engine.IO revision sent as the `EIO` query parameter.
pub const ENGINE_PROTOCOL: u8 = 4;
pub const DEFAULT_NAMESPACE: &str = "/";

/// Body of the engine `open` packet. Intervals are in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping,
    Pong,
    Message(SocketPacket),
    Noop,
}

impl EnginePacket {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let mut chars = text.chars();
        let kind = chars.next().ok_or(ProtocolError::Empty)?;
        let body = chars.as_str();
        match kind {
            '0' => Ok(EnginePacket::Open(serde_json::from_str(body)?)),
            '1' => Ok(EnginePacket::Close),
            // probe payloads only matter for transport upgrades
            '2' => Ok(EnginePacket::Ping),
            '3' => Ok(EnginePacket::Pong),
            '4' => SocketPacket::decode(body).map(EnginePacket::Message),
            '6' => Ok(EnginePacket::Noop),
            other => Err(ProtocolError::UnsupportedPacket(other)),
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(match self {
            EnginePacket::Open(handshake) => format!("0{}", serde_json::to_string(handshake)?),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping => "2".to_string(),
            EnginePacket::Pong => "3".to_string(),
            EnginePacket::Message(packet) => format!("4{}", packet.encode()?),
            EnginePacket::Noop => "6".to_string(),
        })
    }
}

/// A named event with its arguments, `["name", arg, ...]` on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub args: Vec<Value>,
}

impl Event {
    fn from_value(value: Option<Value>) -> Result<Self, ProtocolError> {
        let Some(Value::Array(mut args)) = value else {
            return Err(ProtocolError::Malformed("event body must be an array"));
        };
        if args.is_empty() {
            return Err(ProtocolError::Malformed("event without a name"));
        }
        let Value::String(name) = args.remove(0) else {
            return Err(ProtocolError::Malformed("event name must be a string"));
        };
        Ok(Self { name, args })
    }

    fn to_value(&self) -> Value {
        let mut items = Vec::with_capacity(self.args.len() + 1);
        items.push(Value::String(self.name.clone()));
        items.extend(self.args.iter().cloned());
        Value::Array(items)
    }

    /// First argument decoded as `T`; a missing argument decodes from `null`.
    fn payload<T: DeserializeOwned>(self) -> Result<T, ProtocolError> {
        let first = self.args.into_iter().next().unwrap_or(Value::Null);
        Ok(serde_json::from_value(first)?)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        data: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        ack_id: Option<u64>,
        event: Event,
    },
    ConnectError {
        namespace: String,
        data: Value,
    },
}

impl SocketPacket {
    pub fn event(namespace: &str, event: Event) -> Self {
        SocketPacket::Event {
            namespace: namespace.to_string(),
            ack_id: None,
            event,
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            SocketPacket::Connect { namespace, .. }
            | SocketPacket::Disconnect { namespace }
            | SocketPacket::Event { namespace, .. }
            | SocketPacket::ConnectError { namespace, .. } => namespace,
        }
    }

    /// Layout: `<type>[<namespace>,][<ack id>][<json>]`; the namespace is
    /// omitted for `/`.
    pub fn decode(body: &str) -> Result<Self, ProtocolError> {
        let mut chars = body.chars();
        let kind = chars.next().ok_or(ProtocolError::Empty)?;
        let mut rest = chars.as_str();

        let namespace = if rest.starts_with('/') {
            let (namespace, tail) = rest.split_once(',').unwrap_or((rest, ""));
            rest = tail;
            namespace.to_string()
        } else {
            DEFAULT_NAMESPACE.to_string()
        };

        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let ack_id = if digits > 0 {
            Some(
                rest[..digits]
                    .parse()
                    .map_err(|_| ProtocolError::Malformed("ack id out of range"))?,
            )
        } else {
            None
        };
        rest = &rest[digits..];

        let data: Option<Value> = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_str(rest)?)
        };

        match kind {
            '0' => Ok(SocketPacket::Connect { namespace, data }),
            '1' => Ok(SocketPacket::Disconnect { namespace }),
            '2' => Ok(SocketPacket::Event {
                namespace,
                ack_id,
                event: Event::from_value(data)?,
            }),
            '4' => Ok(SocketPacket::ConnectError {
                namespace,
                data: data.unwrap_or(Value::Null),
            }),
            other => Err(ProtocolError::UnsupportedPacket(other)),
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        let (kind, ack_id, data) = match self {
            SocketPacket::Connect { data, .. } => ('0', None, data.clone()),
            SocketPacket::Disconnect { .. } => ('1', None, None),
            SocketPacket::Event { ack_id, event, .. } => ('2', *ack_id, Some(event.to_value())),
            SocketPacket::ConnectError { data, .. } => ('4', None, Some(data.clone())),
        };

        let mut out = String::new();
        out.push(kind);
        if self.namespace() != DEFAULT_NAMESPACE {
            out.push_str(self.namespace());
            out.push(',');
        }
        if let Some(id) = ack_id {
            out.push_str(&id.to_string());
        }
        if let Some(data) = data {
            out.push_str(&serde_json::to_string(&data)?);
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub nickname: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: SessionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitingCount {
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedRoom {
    pub room_id: RoomId,
    pub participants: Vec<String>,
}

/// Server → client events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    StatusChange(StatusChange),
    WaitingCount(WaitingCount),
    Matched,
    JoinedRoom(JoinedRoom),
    NewMessage(ChatMessage),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::StatusChange(_) => "statusChange",
            ServerEvent::WaitingCount(_) => "waitingCount",
            ServerEvent::Matched => "matched",
            ServerEvent::JoinedRoom(_) => "joinedRoom",
            ServerEvent::NewMessage(_) => "newMessage",
        }
    }

    pub fn from_event(event: Event) -> Result<Self, ProtocolError> {
        match event.name.as_str() {
            "statusChange" => event.payload().map(ServerEvent::StatusChange),
            "waitingCount" => event.payload().map(ServerEvent::WaitingCount),
            // carries no payload; whatever the server attaches is ignored
            "matched" => Ok(ServerEvent::Matched),
            "joinedRoom" => event.payload().map(ServerEvent::JoinedRoom),
            "newMessage" => event.payload().map(ServerEvent::NewMessage),
            _ => Err(ProtocolError::UnknownEvent(event.name)),
        }
    }

    pub fn to_event(&self) -> Result<Event, ProtocolError> {
        let args = match self {
            ServerEvent::StatusChange(payload) => vec![serde_json::to_value(payload)?],
            ServerEvent::WaitingCount(payload) => vec![serde_json::to_value(payload)?],
            ServerEvent::Matched => Vec::new(),
            ServerEvent::JoinedRoom(payload) => vec![serde_json::to_value(payload)?],
            ServerEvent::NewMessage(payload) => vec![serde_json::to_value(payload)?],
        };
        Ok(Event {
            name: self.name().to_string(),
            args,
        })
    }

    /// Full engine frame for this event on `namespace`.
    pub fn encode(&self, namespace: &str) -> Result<String, ProtocolError> {
        EnginePacket::Message(SocketPacket::event(namespace, self.to_event()?)).encode()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinQueue {
    pub nickname: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessage {
    pub message: String,
    pub nickname: String,
}

/// Client → server intents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    JoinQueue(JoinQueue),
    SendMessage(SendMessage),
}

impl ClientRequest {
    pub fn name(&self) -> &'static str {
        match self {
            ClientRequest::JoinQueue(_) => "joinQueue",
            ClientRequest::SendMessage(_) => "sendMessage",
        }
    }

    pub fn from_event(event: Event) -> Result<Self, ProtocolError> {
        match event.name.as_str() {
            "joinQueue" => event.payload().map(ClientRequest::JoinQueue),
            "sendMessage" => event.payload().map(ClientRequest::SendMessage),
            _ => Err(ProtocolError::UnknownEvent(event.name)),
        }
    }

    pub fn to_event(&self) -> Result<Event, ProtocolError> {
        let payload = match self {
            ClientRequest::JoinQueue(payload) => serde_json::to_value(payload)?,
            ClientRequest::SendMessage(payload) => serde_json::to_value(payload)?,
        };
        Ok(Event {
            name: self.name().to_string(),
            args: vec![payload],
        })
    }

    /// Full engine frame for this request on `namespace`.
    pub fn encode(&self, namespace: &str) -> Result<String, ProtocolError> {
        EnginePacket::Message(SocketPacket::event(namespace, self.to_event()?)).encode()
    }

    /// Parses an engine frame that must carry a request event.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        match EnginePacket::decode(text)? {
            EnginePacket::Message(SocketPacket::Event { event, .. }) => Self::from_event(event),
            _ => Err(ProtocolError::Malformed("expected an event packet")),
        }
    }
}
