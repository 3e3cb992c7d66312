use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::constants::{conversation, endpoints, env, models};
use crate::error::EscribeError;
use crate::llm::{ChatOptions, LlmClient, OpenAIClient};
use crate::store::StoreClient;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub assistant: AssistantSettings,
    pub server: ServerSettings,
    pub client: ClientSettings,
    pub store: StoreSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssistantSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub api_key_env: String,
    pub base_url: Option<String>,
    pub history_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientSettings {
    /// Where the assistant proxy listens.
    pub proxy_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreSettings {
    pub url: Option<String>,
    pub anon_key_env: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            url: None,
            anon_key_env: env::STORE_ANON_KEY.to_string(),
        }
    }
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            model: models::DEFAULT_OPENAI_MODEL.to_string(),
            temperature: models::DEFAULT_TEMPERATURE,
            max_tokens: models::DEFAULT_MAX_TOKENS,
            api_key_env: env::OPENAI_API_KEY.to_string(),
            base_url: None,
            history_limit: conversation::MAX_HISTORY,
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: endpoints::DEFAULT_HOST.to_string(),
            port: endpoints::DEFAULT_PORT,
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            proxy_url: endpoints::DEFAULT_PROXY_URL.to_string(),
        }
    }
}

impl Settings {
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("escribe")
            .join("config.toml")
    }

    /// Load from the default location, falling back to defaults, then apply
    /// environment overrides.
    pub fn load() -> Self {
        let mut settings = Self::load_from(&Self::config_path()).unwrap_or_default();
        settings.apply_env();
        settings
    }

    pub fn load_from(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&content) {
            Ok(settings) => Some(settings),
            Err(e) => {
                tracing::warn!("Ignoring invalid config {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn save(&self) -> Result<(), EscribeError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), EscribeError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| EscribeError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Overlay `PORT`, `ESCRIBE_PROXY_URL` and `SUPABASE_URL` when set.
    pub fn apply_env(&mut self) {
        if let Some(port) = std::env::var(env::PORT).ok().and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Ok(url) = std::env::var(env::PROXY_URL) {
            if !url.is_empty() {
                self.client.proxy_url = url;
            }
        }
        if let Ok(url) = std::env::var(env::STORE_URL) {
            if !url.is_empty() {
                self.store.url = Some(url);
            }
        }
    }

    /// Get the API key from the environment variable specified in settings.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.assistant.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
    }

    pub fn store_anon_key(&self) -> Option<String> {
        std::env::var(&self.store.anon_key_env)
            .ok()
            .filter(|k| !k.is_empty())
    }

    pub fn chat_options(&self) -> ChatOptions {
        ChatOptions {
            temperature: self.assistant.temperature,
            max_tokens: self.assistant.max_tokens,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Build the language-model client from the current settings.
    pub fn build_llm_client(&self) -> Result<Arc<dyn LlmClient>, EscribeError> {
        let api_key = self.api_key().ok_or_else(|| {
            EscribeError::Config(format!(
                "{} is not set",
                self.assistant.api_key_env
            ))
        })?;
        let mut client = OpenAIClient::new(api_key).with_model(self.assistant.model.clone());
        if let Some(ref base_url) = self.assistant.base_url {
            client = client.with_base_url(base_url.clone());
        }
        Ok(Arc::new(client))
    }

    pub fn build_store_client(&self) -> Result<StoreClient, EscribeError> {
        let url = self
            .store
            .url
            .clone()
            .ok_or_else(|| EscribeError::Config(format!("{} is not set", env::STORE_URL)))?;
        let key = self.store_anon_key().ok_or_else(|| {
            EscribeError::Config(format!("{} is not set", self.store.anon_key_env))
        })?;
        StoreClient::new(url, key)
    }
}
