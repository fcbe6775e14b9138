use anyhow::Result;
use chrono::{DateTime, Utc};

use super::chat::ChatMessage;

/// The outbound side of the chat channel.
pub trait MessageSink {
    /// Hand a serialized `chat message` record to the channel without waiting
    /// for delivery.
    fn send_chat_message(&self, payload: String) -> Result<()>;
}

/// Values of the two input fields of the chat form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposeForm {
    pub user: String,
    pub text: String,
}

impl ComposeForm {
    pub fn with_user(user: String) -> Self {
        Self {
            user,
            text: String::new(),
        }
    }
}

/// Package the form into a message and send it. Empty fields are allowed and
/// the text field is cleared whatever the send outcome.
pub fn submit_local_message(form: &mut ComposeForm, sink: &impl MessageSink) -> ChatMessage {
    submit_local_message_at(form, sink, Utc::now())
}

pub fn submit_local_message_at(
    form: &mut ComposeForm,
    sink: &impl MessageSink,
    now: DateTime<Utc>,
) -> ChatMessage {
    let message = ChatMessage::new(form.user.clone(), std::mem::take(&mut form.text), now);

    match message.encode() {
        Ok(payload) => {
            if let Err(e) = sink.send_chat_message(payload) {
                tracing::warn!("Failed to hand message to channel: {}", e);
            }
        }
        Err(e) => tracing::warn!("Failed to serialize outgoing message: {}", e),
    }

    message
}
