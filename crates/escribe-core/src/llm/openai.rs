use crate::constants::{endpoints, models};
use crate::error::EscribeError;
use crate::llm::traits::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub struct OpenAIClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAIClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: models::DEFAULT_OPENAI_MODEL.to_string(),
            base_url: endpoints::OPENAI_BASE_URL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorBody {
    error: OpenAIErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorDetail {
    message: String,
}

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<Value>,
    temperature: f32,
    max_tokens: u32,
}

/// Pulls the provider's own message out of an error body, if it has one.
fn provider_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<OpenAIErrorBody>(body)
        .ok()
        .map(|b| b.error.message)
        .filter(|m| !m.is_empty())
}

/// Error for a non-2xx reply. The status goes to the log; the error carries
/// only the provider's message so it can be shown as is.
fn upstream_error(status: reqwest::StatusCode, body: String) -> EscribeError {
    let detail = provider_error_message(&body).unwrap_or(body);
    let detail = detail.trim().to_string();
    tracing::warn!("OpenAI API error ({}): {}", status, detail);
    EscribeError::Llm(detail)
}

#[async_trait::async_trait]
impl LlmClient for OpenAIClient {
    async fn chat(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<LlmResponse, EscribeError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        // Only role and content go upstream; display metadata stays local.
        let oai_messages: Vec<Value> = messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": m.role,
                    "content": m.content,
                })
            })
            .collect();

        let request_body = OpenAIRequest {
            model: self.model.clone(),
            messages: oai_messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            return Err(upstream_error(status, response_text));
        }

        let api_response: OpenAIResponse = serde_json::from_str(&response_text)
            .map_err(|e| EscribeError::Llm(format!("Failed to parse response: {e}")))?;

        let choice = api_response
            .choices
            .first()
            .ok_or_else(|| EscribeError::Llm("No response from API".into()))?;

        let content = choice.message.content.clone().unwrap_or_default();

        Ok(LlmResponse {
            message: Message::assistant(content),
            usage: api_response.usage.map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_message_reads_nested_message() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        assert_eq!(
            provider_error_message(body).as_deref(),
            Some("Incorrect API key provided")
        );
    }

    #[test]
    fn provider_error_message_ignores_other_bodies() {
        assert!(provider_error_message("upstream connect error").is_none());
        assert!(provider_error_message(r#"{"error":{"message":""}}"#).is_none());
    }

    #[test]
    fn upstream_error_carries_provider_message_only() {
        let err = upstream_error(
            reqwest::StatusCode::UNAUTHORIZED,
            r#"{"error":{"message":"Incorrect API key provided"}}"#.to_string(),
        );
        assert_eq!(err.user_message(), "Incorrect API key provided");

        let err = upstream_error(reqwest::StatusCode::BAD_GATEWAY, "  \n".to_string());
        assert_eq!(err.user_message(), "");
    }

    #[test]
    fn request_carries_sampling_parameters() {
        let body = OpenAIRequest {
            model: "gpt-4o".into(),
            messages: vec![serde_json::json!({"role": "user", "content": "hi"})],
            temperature: 0.7,
            max_tokens: 500,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["model"], "gpt-4o");
        assert_eq!(value["max_tokens"], 500);
        assert!((value["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }
}
