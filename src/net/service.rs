use anyhow::Result;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::task::{network_background_task, socket_url};
use crate::entities::MessageSink;
use crate::net::{CHAT_MESSAGE, EngineVersion, NetworkCommand, NetworkEvent};

/// Handle to the Socket.IO connection, run by a background task.
#[derive(Debug, Default)]
pub struct ChatNetworkService {
    /// Send commands to the background network task
    pub command_tx: Option<UnboundedSender<NetworkCommand>>,
    /// Receive events from the background network task
    pub event_rx: Option<UnboundedReceiver<NetworkEvent>>,
}

impl ChatNetworkService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the background task for `server_url`. Must be called inside a
    /// tokio runtime.
    pub fn connect(&mut self, server_url: &str, version: EngineVersion) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        self.command_tx = Some(command_tx);
        self.event_rx = Some(event_rx);

        tokio::spawn(network_background_task(
            socket_url(server_url, version),
            version,
            command_rx,
            event_tx,
        ));
    }

    /// Queue an outbound event; returns as soon as the task has it.
    pub fn emit(&self, event: &str, payload: String) -> Result<()> {
        let Some(tx) = &self.command_tx else {
            tracing::warn!("Not connected, dropping {:?} event", event);
            return Ok(());
        };

        tx.send(NetworkCommand::Emit {
            event: event.to_string(),
            payload,
        })
        .map_err(|e| anyhow::anyhow!("Failed to send network command: {}", e))
    }

    pub fn disconnect(&self) {
        if let Some(tx) = &self.command_tx {
            let _ = tx.send(NetworkCommand::Disconnect);
        }
    }

    /// Try to receive a network event (non-blocking)
    pub fn try_receive_event(&mut self) -> Option<NetworkEvent> {
        self.event_rx.as_mut()?.try_recv().ok()
    }
}

impl MessageSink for ChatNetworkService {
    fn send_chat_message(&self, payload: String) -> Result<()> {
        self.emit(CHAT_MESSAGE, payload)
    }
}
