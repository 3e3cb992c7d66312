mod manager;
mod transport;

pub use manager::{AskOptions, AssistantReply, ConversationManager};
pub use transport::{AssistantTransport, HttpTransport, LocalTransport};
