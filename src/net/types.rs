use thiserror::Error;

/// Inbound event carrying one serialized chat record.
pub const CHAT_MESSAGE: &str = "chat message";
/// Inbound event carrying the newline-joined backlog, sent once on connect.
pub const CHAT_HISTORY: &str = "chat history";

/// Commands that can be sent to the background network task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkCommand {
    Emit { event: String, payload: String },
    Disconnect,
}

/// Events that the background network task sends back to the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    Connected,
    ChatMessage(String),
    ChatHistory(Option<String>),
    Disconnected,
    Error(NetworkError),
}

/// Network error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("connection failed: {0}")]
    ConnectFailed(String),
    #[error("server rejected connection: {0}")]
    ConnectRejected(String),
    #[error("send failed: {0}")]
    SendFailed(String),
}
