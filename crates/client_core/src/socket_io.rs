//! Socket.IO client transport built on `tokio-tungstenite`.
//!
//! Each link runs one task that owns the socket. The task performs the
//! Engine.IO handshake, joins the namespace, answers heartbeats and forwards
//! decoded events. It reports `Connected` once the namespace is joined and
//! always finishes with a single `Disconnected`.

use std::time::Duration;

use futures::{Sink, SinkExt, StreamExt};
use serde_json::Value;
use shared::protocol::{ClientRequest, EnginePacket, Handshake, ServerEvent, SocketPacket};
use tokio::{
    net::TcpStream,
    runtime::Handle,
    sync::mpsc,
    time::{sleep_until, timeout, Instant},
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

use crate::{
    error::TransportError,
    transport::{Connector, Endpoint, InboundSender, TransportEvent, TransportLink},
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug)]
enum Outbound {
    Request(ClientRequest),
    Close,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SocketIoConnector;

impl Connector for SocketIoConnector {
    type Link = SocketIoLink;

    fn open(
        &mut self,
        endpoint: &Endpoint,
        inbound: InboundSender,
    ) -> Result<Self::Link, TransportError> {
        let runtime = Handle::try_current().map_err(|_| TransportError::NoRuntime)?;
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        runtime.spawn(run_socket(endpoint.clone(), inbound, outbound_rx));
        Ok(SocketIoLink { outbound })
    }
}

/// Handle to one socket task. Requests emitted before the namespace is
/// joined are queued and flushed once connected. Dropping the link closes
/// the socket.
#[derive(Debug)]
pub struct SocketIoLink {
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl TransportLink for SocketIoLink {
    fn emit(&mut self, request: ClientRequest) -> Result<(), TransportError> {
        self.outbound
            .send(Outbound::Request(request))
            .map_err(|_| TransportError::Closed)
    }

    fn close(&mut self) {
        let _ = self.outbound.send(Outbound::Close);
    }
}

async fn run_socket(
    endpoint: Endpoint,
    inbound: InboundSender,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    let opened = timeout(CONNECT_TIMEOUT, open_socket(&endpoint))
        .await
        .unwrap_or(Err(TransportError::Timeout(CONNECT_TIMEOUT)));
    let (socket, handshake) = match opened {
        Ok(opened) => opened,
        Err(err) => {
            warn!(%endpoint, error = %err, "socket.io connect failed");
            let _ = inbound.send(TransportEvent::Disconnected);
            return;
        }
    };
    info!(%endpoint, sid = %handshake.sid, "socket.io session open");
    if inbound.send(TransportEvent::Connected).is_err() {
        return;
    }

    let namespace = endpoint.namespace();
    // the server pings every interval and expects to be heard from within the timeout
    let heartbeat = Duration::from_millis(handshake.ping_interval + handshake.ping_timeout);
    let mut deadline = Instant::now() + heartbeat;
    let (mut writer, mut reader) = socket.split();

    loop {
        tokio::select! {
            frame = reader.next() => {
                deadline = Instant::now() + heartbeat;
                match frame {
                    Some(Ok(Message::Text(text))) => match EnginePacket::decode(&text) {
                        Ok(EnginePacket::Ping) => {
                            if let Err(err) = send_packet(&mut writer, &EnginePacket::Pong).await {
                                warn!(%endpoint, error = %err, "failed to answer ping");
                                break;
                            }
                        }
                        Ok(EnginePacket::Message(SocketPacket::Event { namespace: target, event, .. }))
                            if target == namespace =>
                        {
                            match ServerEvent::from_event(event) {
                                Ok(event) => {
                                    debug!(event = event.name(), "server event received");
                                    if inbound.send(TransportEvent::Server(event)).is_err() {
                                        // nobody is listening anymore
                                        break;
                                    }
                                }
                                Err(err) => warn!(error = %err, "dropping undecodable server event"),
                            }
                        }
                        Ok(EnginePacket::Message(SocketPacket::Disconnect { namespace: target }))
                            if target == namespace =>
                        {
                            info!(%endpoint, "namespace closed by server");
                            break;
                        }
                        Ok(EnginePacket::Close) => {
                            info!(%endpoint, "engine closed by server");
                            break;
                        }
                        Ok(other) => debug!(packet = ?other, "ignoring packet"),
                        Err(err) => warn!(error = %err, "dropping undecodable frame"),
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        info!(%endpoint, "websocket closed by server");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(%endpoint, error = %err, "websocket receive failed");
                        break;
                    }
                }
            }
            command = outbound.recv() => match command {
                Some(Outbound::Request(request)) => match request.encode(namespace) {
                    Ok(text) => {
                        debug!(event = request.name(), "sending client request");
                        if let Err(err) = writer.send(Message::Text(text)).await {
                            warn!(%endpoint, error = %err, "websocket send failed");
                            break;
                        }
                    }
                    Err(err) => warn!(event = request.name(), error = %err, "failed to encode request"),
                },
                Some(Outbound::Close) | None => {
                    let leave = EnginePacket::Message(SocketPacket::Disconnect {
                        namespace: namespace.to_string(),
                    });
                    let _ = send_packet(&mut writer, &leave).await;
                    let _ = writer.send(Message::Close(None)).await;
                    info!(%endpoint, "socket closed by client");
                    break;
                }
            },
            _ = sleep_until(deadline) => {
                warn!(%endpoint, ?heartbeat, "no heartbeat from server");
                break;
            }
        }
    }

    let _ = inbound.send(TransportEvent::Disconnected);
}

/// Connects, reads the engine handshake and joins the endpoint's namespace.
async fn open_socket(endpoint: &Endpoint) -> Result<(Socket, Handshake), TransportError> {
    let (mut socket, _) = connect_async(endpoint.as_str()).await.map_err(Box::new)?;

    let handshake = match next_packet(&mut socket).await? {
        EnginePacket::Open(handshake) => handshake,
        _ => return Err(TransportError::Handshake("expected engine open packet")),
    };

    let namespace = endpoint.namespace();
    let join = EnginePacket::Message(SocketPacket::Connect {
        namespace: namespace.to_string(),
        data: None,
    });
    send_packet(&mut socket, &join).await?;

    loop {
        match next_packet(&mut socket).await? {
            EnginePacket::Message(SocketPacket::Connect { namespace: target, .. })
                if target == namespace =>
            {
                return Ok((socket, handshake));
            }
            EnginePacket::Message(SocketPacket::ConnectError { namespace, data })
                if namespace == endpoint.namespace() =>
            {
                return Err(TransportError::Refused {
                    namespace,
                    reason: refusal_reason(&data),
                });
            }
            EnginePacket::Ping => send_packet(&mut socket, &EnginePacket::Pong).await?,
            EnginePacket::Close => {
                return Err(TransportError::Handshake("server closed before namespace ack"))
            }
            other => debug!(packet = ?other, "ignoring packet before namespace ack"),
        }
    }
}

async fn next_packet(socket: &mut Socket) -> Result<EnginePacket, TransportError> {
    loop {
        match socket.next().await {
            Some(Ok(Message::Text(text))) => return Ok(EnginePacket::decode(&text)?),
            Some(Ok(Message::Close(_))) | None => return Err(TransportError::Closed),
            Some(Ok(_)) => {}
            Some(Err(err)) => return Err(Box::new(err).into()),
        }
    }
}

async fn send_packet<S>(sink: &mut S, packet: &EnginePacket) -> Result<(), TransportError>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    sink.send(Message::Text(packet.encode()?))
        .await
        .map_err(Box::new)?;
    Ok(())
}

fn refusal_reason(data: &Value) -> String {
    data.get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| data.to_string())
}

#[cfg(test)]
#[path = "tests/socket_io_tests.rs"]
mod tests;
