//! Chat screen core: state, reply phases and the service that owns them

pub mod service;
pub mod state;
pub mod streaming;

pub use service::{ChatCommand, ChatHandle, ChatService, ChatSnapshot};
pub use state::{ChatError, ChatState};
pub use streaming::ReplyPhase;
