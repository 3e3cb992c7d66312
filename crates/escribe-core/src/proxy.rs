//! Request handling for the assistant proxy endpoint.
//!
//! The handler is transport-agnostic: it takes a raw JSON body and returns a
//! status code plus a JSON body. `escribe-server` puts it behind HTTP and
//! [`crate::assistant::LocalTransport`] calls it in-process.

use crate::constants::proxy as messages;
use crate::context::{wants_structured_edit, with_section_context};
use crate::error::{EscribeError, Result};
use crate::llm::{ChatOptions, LlmClient, Message, StructuredReply};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Body of `POST /api/ai`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AssistantRequest {
    pub messages: Vec<Message>,
    #[serde(
        rename = "sectionContent",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub section_content: Option<String>,
    /// Explicit edit intent. When absent the last user turn is sniffed for
    /// "rewrite" / "fix".
    #[serde(
        rename = "expectStructuredEdit",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub expect_structured_edit: Option<bool>,
}

impl AssistantRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_section_content(mut self, content: Option<String>) -> Self {
        self.section_content = content;
        self
    }

    pub fn wants_structured_edit(&self) -> bool {
        self.expect_structured_edit
            .unwrap_or_else(|| wants_structured_edit(&self.messages))
    }
}

/// Status code and JSON body, ready to be written by any HTTP layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyResponse {
    pub status: u16,
    pub body: Value,
}

impl ProxyResponse {
    pub fn ok(message: &Message) -> Self {
        Self {
            status: 200,
            body: serde_json::json!({ "response": message }),
        }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: serde_json::json!({ "error": message.into() }),
        }
    }

    pub fn bad_request() -> Self {
        Self::error(400, messages::INVALID_MESSAGES)
    }

    pub fn method_not_allowed() -> Self {
        Self::error(405, messages::METHOD_NOT_ALLOWED)
    }

    pub fn not_found() -> Self {
        Self::error(404, messages::NOT_FOUND)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Validate a raw request body. Anything without a `messages` array is a 400.
pub fn parse_request(body: &[u8]) -> std::result::Result<AssistantRequest, ProxyResponse> {
    let value: Value = serde_json::from_slice(body).map_err(|_| ProxyResponse::bad_request())?;
    if !value.get("messages").map(Value::is_array).unwrap_or(false) {
        return Err(ProxyResponse::bad_request());
    }
    serde_json::from_value(value).map_err(|_| ProxyResponse::bad_request())
}

/// Stateless forwarder from the message list to the language model.
#[derive(Clone)]
pub struct AssistantHandler {
    llm: Arc<dyn LlmClient>,
    options: ChatOptions,
}

impl AssistantHandler {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            options: ChatOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ChatOptions {
        &self.options
    }

    /// Full endpoint behavior for a raw body.
    pub async fn handle_body(&self, body: &[u8]) -> ProxyResponse {
        match parse_request(body) {
            Ok(request) => self.handle(&request).await,
            Err(rejection) => {
                tracing::debug!("Rejected assistant request: invalid messages array");
                rejection
            }
        }
    }

    pub async fn handle(&self, request: &AssistantRequest) -> ProxyResponse {
        match self.respond(request).await {
            Ok(message) => ProxyResponse::ok(&message),
            Err(e) => {
                let message = e.user_message();
                if message.is_empty() {
                    ProxyResponse::error(500, messages::UPSTREAM_FALLBACK)
                } else {
                    ProxyResponse::error(500, message)
                }
            }
        }
    }

    /// Ask the model and post-process the reply.
    pub async fn respond(&self, request: &AssistantRequest) -> Result<Message> {
        let outbound =
            with_section_context(request.messages.clone(), request.section_content.as_deref());

        let response = self
            .llm
            .chat(&outbound, &self.options)
            .await
            .map_err(|e| {
                tracing::warn!("Upstream model call failed: {}", e);
                e
            })?;

        if let Some(usage) = &response.usage {
            tracing::info!(
                "Assistant reply: {} messages in, {} prompt tokens, {} completion tokens",
                outbound.len(),
                usage.input_tokens,
                usage.output_tokens
            );
        }

        let text = response.message.content;
        if request.wants_structured_edit() {
            Ok(Message::assistant(StructuredReply::new(text).to_content()))
        } else {
            Ok(Message::assistant(text))
        }
    }
}

impl std::fmt::Debug for AssistantHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistantHandler")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl From<ProxyResponse> for EscribeError {
    fn from(response: ProxyResponse) -> Self {
        let message = response
            .body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or(crate::constants::conversation::BACKEND_UNREACHABLE)
            .to_string();
        EscribeError::Transport(message)
    }
}
