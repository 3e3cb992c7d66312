use thiserror::Error;

#[derive(Error, Debug)]
pub enum EscribeError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error ({status}): {message}")]
    Store { status: u16, message: String },

    /// The assistant proxy could not be reached or answered with an error body.
    #[error("{0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl EscribeError {
    pub fn store(status: u16, message: impl Into<String>) -> Self {
        Self::Store {
            status,
            message: message.into(),
        }
    }

    /// The message shown to a person, without the variant prefix.
    pub fn user_message(&self) -> String {
        match self {
            Self::Llm(msg) | Self::Validation(msg) | Self::Config(msg) => msg.clone(),
            Self::Store { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EscribeError>;
