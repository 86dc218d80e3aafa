use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use shared_utils::env::{MissingEnvVarError, get_env_var};
use signal_engine::signal::{Signal, SignalSink, SinkError};
use thiserror::Error;

use crate::render::render;

/// Errors raised while delivering to Telegram.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The HTTP request itself failed (network, TLS, timeout).
    #[error("Telegram request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The Bot API answered with an error payload.
    #[error("Telegram API error: {0}")]
    Api(String),

    /// Bot credentials are not configured.
    #[error(transparent)]
    Credentials(#[from] MissingEnvVarError),
}

/// Posts messages to one Telegram chat through the Bot API.
pub struct TelegramNotifier {
    client: Client,
    token: SecretString,
    chat_id: String,
}

impl TelegramNotifier {
    /// Creates a notifier for the given bot token and chat.
    pub fn new(token: SecretString, chat_id: impl Into<String>) -> Result<Self, NotifyError> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            token,
            chat_id: chat_id.into(),
        })
    }

    /// Reads `TELEGRAM_BOT_TOKEN` and `TELEGRAM_CHAT_ID` from the environment.
    pub fn from_env() -> Result<Self, NotifyError> {
        let token = SecretString::new(get_env_var("TELEGRAM_BOT_TOKEN")?.into());
        let chat_id = get_env_var("TELEGRAM_CHAT_ID")?;
        Self::new(token, chat_id)
    }

    /// Sends a plain text message (startup notices, health reports).
    pub async fn send_text(&self, text: &str) -> Result<(), NotifyError> {
        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            self.token.expose_secret()
        );
        let payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
        });

        let response = self.client.post(&url).json(&payload).send().await?;
        if !response.status().is_success() {
            let error_msg = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown API error".to_string());
            return Err(NotifyError::Api(error_msg));
        }
        Ok(())
    }
}

#[async_trait]
impl SignalSink for TelegramNotifier {
    async fn deliver(&self, signal: &Signal) -> Result<(), SinkError> {
        self.send_text(&render(signal))
            .await
            .map_err(|e| SinkError(e.to_string()))
    }
}
