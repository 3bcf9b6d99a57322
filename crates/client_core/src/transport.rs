//! Contract between the session state machine and whatever carries its events.
//!
//! A [`Connector`] is handed to the client once, at construction. Each call to
//! [`Connector::open`] yields a [`TransportLink`] that the client owns
//! exclusively until disconnect; dropping the link releases the connection.
//! Inbound traffic for that link flows through the [`InboundSender`] given to
//! `open`, in arrival order.

use std::fmt;

use shared::protocol::{ClientRequest, ServerEvent, DEFAULT_NAMESPACE, ENGINE_PROTOCOL};
use tokio::sync::mpsc;
use url::Url;

use crate::error::TransportError;

pub type InboundSender = mpsc::UnboundedSender<TransportEvent>;
pub type InboundReceiver = mpsc::UnboundedReceiver<TransportEvent>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    Server(ServerEvent),
}

pub trait TransportLink: Send {
    /// Queues an outbound intent. Fails only once the link is known dead.
    fn emit(&mut self, request: ClientRequest) -> Result<(), TransportError>;

    /// Starts an orderly shutdown. Calling it more than once is harmless.
    fn close(&mut self);
}

pub trait Connector: Send {
    type Link: TransportLink;

    fn open(
        &mut self,
        endpoint: &Endpoint,
        inbound: InboundSender,
    ) -> Result<Self::Link, TransportError>;
}

/// Socket.IO address of the matching service.
///
/// Built from the same base URL a browser client would use: the scheme is
/// mapped to its WebSocket counterpart, the URL path names the namespace and
/// the socket itself lives at [`Self::SOCKET_PATH`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
    namespace: String,
}

impl Endpoint {
    pub const SOCKET_PATH: &'static str = "/socket.io/";

    /// Accepts `http(s)://` or `ws(s)://` URLs. `http://host:3010` connects to
    /// the default namespace, `http://host:3010/match` to `/match`. A URL that
    /// already points at the socket path is taken as the default namespace.
    pub fn parse(raw: &str) -> Result<Self, TransportError> {
        let raw = raw.trim();
        let mut url = Url::parse(raw).map_err(|source| TransportError::InvalidEndpoint {
            url: raw.to_string(),
            source,
        })?;

        let ws_scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => return Err(TransportError::UnsupportedScheme(other.to_string())),
        };
        if url.scheme() != ws_scheme && url.set_scheme(ws_scheme).is_err() {
            return Err(TransportError::UnsupportedScheme(url.scheme().to_string()));
        }

        let path = url.path().trim_end_matches('/');
        let namespace = if path.is_empty() || path == Self::SOCKET_PATH.trim_end_matches('/') {
            DEFAULT_NAMESPACE.to_string()
        } else {
            path.to_string()
        };

        url.set_path(Self::SOCKET_PATH);
        url.set_query(Some(&format!(
            "EIO={ENGINE_PROTOCOL}&transport=websocket"
        )));
        url.set_fragment(None);

        Ok(Self { url, namespace })
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())?;
        if self.namespace != DEFAULT_NAMESPACE {
            write!(f, " (namespace {})", self.namespace)?;
        }
        Ok(())
    }
}
