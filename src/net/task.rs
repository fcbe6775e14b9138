use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::{Instant, Interval, interval_at};
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::net::{
    CHAT_HISTORY, CHAT_MESSAGE, EngineVersion, Frame, NetworkCommand, NetworkError, NetworkEvent,
};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;

/// Map a server base URL to its Socket.IO websocket endpoint.
pub fn socket_url(server_url: &str, version: EngineVersion) -> String {
    let base = server_url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if base.starts_with("ws://") || base.starts_with("wss://") {
        base.to_string()
    } else {
        format!("ws://{base}")
    };

    format!(
        "{base}/socket.io/?EIO={}&transport=websocket",
        version.query_value()
    )
}

/// What the task should do in response to one inbound frame.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Reaction {
    pub send: Vec<Frame>,
    pub event: Option<NetworkEvent>,
    pub close: bool,
}

/// Protocol state of one connection, independent of the socket.
#[derive(Debug, Default)]
pub struct Session {
    version: EngineVersion,
    connected: bool,
    queued: Vec<Frame>,
    /// Client-driven ping period, only for v3 once the handshake is in.
    heartbeat: Option<Duration>,
}

impl Session {
    pub fn new(version: EngineVersion) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn heartbeat_interval(&self) -> Option<Duration> {
        self.heartbeat
    }

    /// Frame to send when the heartbeat timer fires.
    pub fn on_heartbeat(&self) -> Option<Frame> {
        self.heartbeat.map(|_| Frame::Ping)
    }

    /// Returns the frame to send now, or queues it until the namespace connects.
    pub fn emit(&mut self, event: String, payload: String) -> Option<Frame> {
        let frame = Frame::event(event, payload);
        if self.connected {
            Some(frame)
        } else {
            tracing::debug!("Queueing emit until connected");
            self.queued.push(frame);
            None
        }
    }

    pub fn on_frame(&mut self, frame: Frame) -> Reaction {
        match frame {
            Frame::Open(handshake) => {
                tracing::info!(
                    "Engine.IO v{} session opened: {}",
                    self.version.query_value(),
                    handshake.sid
                );
                match self.version {
                    // The server joins us to the default namespace itself.
                    EngineVersion::V3 => {
                        self.heartbeat = (handshake.ping_interval > 0)
                            .then(|| Duration::from_millis(handshake.ping_interval));
                        Reaction::default()
                    }
                    EngineVersion::V4 => Reaction {
                        send: vec![Frame::Connect],
                        ..Reaction::default()
                    },
                }
            }
            Frame::Ping => Reaction {
                send: vec![Frame::Pong],
                ..Reaction::default()
            },
            Frame::Pong | Frame::Noop => Reaction::default(),
            Frame::Connect => {
                self.connected = true;
                Reaction {
                    send: std::mem::take(&mut self.queued),
                    event: Some(NetworkEvent::Connected),
                    close: false,
                }
            }
            Frame::Event { name, payload } => Reaction {
                event: route_event(&name, payload),
                ..Reaction::default()
            },
            Frame::ConnectError(message) => {
                tracing::error!("Server rejected namespace connect: {}", message);
                self.connected = false;
                Reaction {
                    event: Some(NetworkEvent::Error(NetworkError::ConnectRejected(message))),
                    close: true,
                    ..Reaction::default()
                }
            }
            Frame::Close | Frame::Disconnect => {
                self.connected = false;
                Reaction {
                    event: Some(NetworkEvent::Disconnected),
                    close: true,
                    ..Reaction::default()
                }
            }
        }
    }
}

fn route_event(name: &str, payload: Option<String>) -> Option<NetworkEvent> {
    match name {
        CHAT_MESSAGE => match payload {
            Some(raw) => Some(NetworkEvent::ChatMessage(raw)),
            None => {
                tracing::warn!("Dropping chat message event without payload");
                None
            }
        },
        CHAT_HISTORY => Some(NetworkEvent::ChatHistory(payload)),
        other => {
            tracing::debug!("Ignoring event {:?}", other);
            None
        }
    }
}

/// State for the network background task
struct SocketTaskState {
    ws_tx: WsSink,
    session: Session,
    event_tx: UnboundedSender<NetworkEvent>,
}

impl SocketTaskState {
    async fn send_frame(&mut self, frame: &Frame) -> Result<(), tungstenite::Error> {
        let text = frame.encode();
        tracing::debug!("-> {}", text);
        self.ws_tx.send(WsMessage::Text(text)).await
    }

    async fn send_or_report(&mut self, frame: &Frame) {
        if let Err(e) = self.send_frame(frame).await {
            tracing::error!("Failed to send frame: {}", e);
            let _ = self
                .event_tx
                .send(NetworkEvent::Error(NetworkError::SendFailed(e.to_string())));
        }
    }

    /// Returns false when the task should stop.
    async fn handle_command(&mut self, command: NetworkCommand) -> bool {
        match command {
            NetworkCommand::Emit { event, payload } => {
                tracing::info!("Background task: emitting {:?}", event);
                if let Some(frame) = self.session.emit(event, payload) {
                    self.send_or_report(&frame).await;
                }
                true
            }
            NetworkCommand::Disconnect => {
                tracing::info!("Background task: disconnecting");
                if self.session.is_connected() {
                    self.send_or_report(&Frame::Disconnect).await;
                }
                let _ = self.ws_tx.close().await;
                let _ = self.event_tx.send(NetworkEvent::Disconnected);
                false
            }
        }
    }

    /// Returns false when the task should stop.
    async fn handle_socket_message(
        &mut self,
        message: Option<Result<WsMessage, tungstenite::Error>>,
    ) -> bool {
        let text = match message {
            Some(Ok(WsMessage::Text(text))) => text,
            // tungstenite answers websocket pings on its own.
            Some(Ok(WsMessage::Ping(_))) => return true,
            Some(Ok(WsMessage::Close(_))) | None => {
                tracing::warn!("Socket closed by server");
                let _ = self.event_tx.send(NetworkEvent::Disconnected);
                return false;
            }
            Some(Ok(_)) => return true,
            Some(Err(e)) => {
                tracing::error!("Socket error: {}", e);
                let _ = self.event_tx.send(NetworkEvent::Disconnected);
                return false;
            }
        };

        tracing::debug!("<- {}", text);
        let frame = match Frame::parse(&text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Skipping unparsable frame: {}", e);
                return true;
            }
        };

        let reaction = self.session.on_frame(frame);
        for frame in &reaction.send {
            self.send_or_report(frame).await;
        }
        if let Some(event) = reaction.event {
            let _ = self.event_tx.send(event);
        }

        !reaction.close
    }

    async fn handle_heartbeat(&mut self) -> bool {
        if let Some(frame) = self.session.on_heartbeat() {
            self.send_or_report(&frame).await;
        }
        true
    }
}

async fn next_heartbeat(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Background task that owns the websocket for the lifetime of the connection
pub async fn network_background_task(
    url: String,
    version: EngineVersion,
    mut command_rx: UnboundedReceiver<NetworkCommand>,
    event_tx: UnboundedSender<NetworkEvent>,
) {
    tracing::info!("Network background task started, connecting to {}", url);

    let (ws_stream, _) = match connect_async(url.as_str()).await {
        Ok(connection) => connection,
        Err(e) => {
            tracing::error!("Failed to connect to {}: {}", url, e);
            let _ = event_tx.send(NetworkEvent::Error(NetworkError::ConnectFailed(
                e.to_string(),
            )));
            return;
        }
    };
    let (ws_tx, mut ws_rx) = ws_stream.split();

    let mut state = SocketTaskState {
        ws_tx,
        session: Session::new(version),
        event_tx,
    };
    let mut heartbeat: Option<Interval> = None;

    loop {
        let keep_running = tokio::select! {
            command = command_rx.recv() => match command {
                Some(cmd) => state.handle_command(cmd).await,
                None => {
                    tracing::info!("Command channel closed, ending background task");
                    false
                }
            },
            message = ws_rx.next() => state.handle_socket_message(message).await,
            _ = next_heartbeat(&mut heartbeat) => state.handle_heartbeat().await,
        };

        if !keep_running {
            break;
        }

        if heartbeat.is_none() {
            if let Some(period) = state.session.heartbeat_interval() {
                tracing::debug!("Pinging server every {:?}", period);
                heartbeat = Some(interval_at(Instant::now() + period, period));
            }
        }
    }

    tracing::info!("Network background task ended");
}
