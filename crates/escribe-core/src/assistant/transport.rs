use crate::constants::{conversation::BACKEND_UNREACHABLE, endpoints::ASSISTANT_ROUTE};
use crate::error::{EscribeError, Result};
use crate::llm::Message;
use crate::proxy::{AssistantHandler, AssistantRequest};
use serde::Deserialize;
use serde_json::Value;

/// Delivers one assistant request and yields the reply message.
#[async_trait::async_trait]
pub trait AssistantTransport: Send + Sync {
    async fn send(&self, request: &AssistantRequest) -> Result<Message>;
}

#[derive(Debug, Deserialize)]
struct ProxyReply {
    response: Message,
}

/// Talks to a running assistant proxy over HTTP.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(proxy_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}{}", proxy_url.trim_end_matches('/'), ASSISTANT_ROUTE),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// The proxy's `{ "error": ... }` field, if the body carries one.
fn error_field(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()?
        .get("error")?
        .as_str()
        .filter(|e| !e.is_empty())
        .map(String::from)
}

#[async_trait::async_trait]
impl AssistantTransport for HttpTransport {
    async fn send(&self, request: &AssistantRequest) -> Result<Message> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| EscribeError::Transport(format!("{}: {}", BACKEND_UNREACHABLE, e)))?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = error_field(&body).unwrap_or_else(|| BACKEND_UNREACHABLE.to_string());
            return Err(EscribeError::Transport(message));
        }

        let reply: ProxyReply = serde_json::from_str(&body)?;
        Ok(reply.response)
    }
}

/// Runs the proxy handler in-process, skipping the HTTP hop.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    handler: AssistantHandler,
}

impl LocalTransport {
    pub fn new(handler: AssistantHandler) -> Self {
        Self { handler }
    }
}

#[async_trait::async_trait]
impl AssistantTransport for LocalTransport {
    async fn send(&self, request: &AssistantRequest) -> Result<Message> {
        let response = self.handler.handle(request).await;
        if !response.is_success() {
            return Err(response.into());
        }
        let message = response
            .body
            .get("response")
            .cloned()
            .ok_or_else(|| EscribeError::Transport(BACKEND_UNREACHABLE.to_string()))?;
        Ok(serde_json::from_value(message)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let transport = HttpTransport::new("http://localhost:3001/");
        assert_eq!(transport.endpoint(), "http://localhost:3001/api/ai");
    }

    #[test]
    fn error_field_reads_proxy_errors() {
        assert_eq!(
            error_field(r#"{"error":"quota exceeded"}"#).as_deref(),
            Some("quota exceeded")
        );
        assert!(error_field("<html>502</html>").is_none());
        assert!(error_field(r#"{"error":""}"#).is_none());
    }
}
