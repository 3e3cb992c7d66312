use crate::constants::models;
use crate::error::EscribeError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One conversation turn, as stored in history and as sent over the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Payload actually sent for a user turn whose visible text differs.
    #[serde(
        rename = "originalPrompt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub original_prompt: Option<String>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            original_prompt: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            original_prompt: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            original_prompt: None,
        }
    }

    pub fn with_original_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.original_prompt = Some(prompt.into());
        self
    }
}

/// An edit suggestion the caller can apply to the document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StructuredReply {
    #[serde(rename = "newContent")]
    pub new_content: String,
}

impl StructuredReply {
    pub fn new(new_content: impl Into<String>) -> Self {
        Self {
            new_content: new_content.into(),
        }
    }

    /// Parses message content that embeds `{"newContent": ...}`.
    /// Anything else, including an empty `newContent`, is plain text.
    pub fn parse(content: &str) -> Option<Self> {
        serde_json::from_str::<StructuredReply>(content)
            .ok()
            .filter(|reply| !reply.new_content.is_empty())
    }

    pub fn to_content(&self) -> String {
        serde_json::json!({ "newContent": self.new_content }).to_string()
    }
}

/// Sampling parameters forwarded with every completion request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChatOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            temperature: models::DEFAULT_TEMPERATURE,
            max_tokens: models::DEFAULT_MAX_TOKENS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub message: Message,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// The LLM client trait. One request, one complete reply.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a chat request and get the full response.
    async fn chat(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<LlmResponse, EscribeError>;
}
