pub mod chat;
pub mod compose;
pub mod feed;
pub mod time_format;

pub use chat::ChatMessage;
pub use compose::{ComposeForm, MessageSink, submit_local_message};
pub use feed::{HistoryPolicy, MessageFeed, RenderedMessage};
pub use time_format::TimeFormatter;
