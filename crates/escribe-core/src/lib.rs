pub mod error;
pub mod constants;
pub mod llm;
pub mod context;
pub mod proxy;
pub mod assistant;
pub mod store;
pub mod config;

// Re-export key types
pub use error::EscribeError;
pub use llm::{ChatOptions, LlmClient, LlmResponse, Message, Role, StructuredReply};
pub use context::{ConversationHistory, PromptMode};
pub use proxy::{AssistantHandler, AssistantRequest, ProxyResponse};
pub use assistant::{AskOptions, AssistantReply, AssistantTransport, ConversationManager};
pub use store::{ExportFormat, Project, Section, StoreClient};
pub use config::Settings;
