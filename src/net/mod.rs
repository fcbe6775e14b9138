pub mod frame;
pub mod service;
pub mod task;
pub mod types;

pub use frame::{EngineVersion, Frame};
pub use service::ChatNetworkService;
pub use types::{CHAT_HISTORY, CHAT_MESSAGE, NetworkCommand, NetworkError, NetworkEvent};
