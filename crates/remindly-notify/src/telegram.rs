//! Telegram Bot API channel.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use remindly_core::models::Notification;
use remindly_core::settings::NotificationSettings;
use remindly_core::sweep::DispatchError;

use crate::channels::{Channel, Delivery};
use crate::format::telegram_message;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Telegram setup errors.
#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("TELEGRAM_BOT_TOKEN is not set")]
    MissingToken,

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Bot credentials and endpoint.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub api_base: String,
    pub timeout: Duration,
}

impl TelegramConfig {
    /// Loads config from env vars:
    /// - `TELEGRAM_BOT_TOKEN` (required)
    /// - `TELEGRAM_API_BASE`  (default: `https://api.telegram.org`)
    pub fn from_env() -> Result<Self, TelegramError> {
        let bot_token = std::env::var("TELEGRAM_BOT_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or(TelegramError::MissingToken)?;
        let api_base =
            std::env::var("TELEGRAM_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        Ok(Self {
            bot_token,
            api_base,
            timeout: Duration::from_secs(10),
        })
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base.trim_end_matches('/'), self.bot_token)
    }
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: String,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Sends notifications to the user's Telegram chat when they enabled it.
pub struct TelegramChannel {
    http: Client,
    config: TelegramConfig,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Result<Self, TelegramError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    fn failed(&self, reason: impl Into<String>) -> DispatchError {
        DispatchError::Channel {
            channel: self.name().to_string(),
            reason: reason.into(),
        }
    }
}

impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn send(
        &self,
        notification: &Notification,
        settings: &NotificationSettings,
    ) -> Result<Delivery, DispatchError> {
        let Some(chat_id) = settings.telegram_chat_id.as_deref().filter(|_| settings.telegram_enabled) else {
            return Ok(Delivery::Skipped);
        };

        let request = SendMessageRequest {
            chat_id,
            text: telegram_message(notification),
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        // the URL carries the bot token, keep it out of error messages
        let response: ApiResponse = self
            .http
            .post(self.config.send_message_url())
            .json(&request)
            .send()
            .map_err(|e| self.failed(e.without_url().to_string()))?
            .json()
            .map_err(|e| self.failed(format!("unreadable response: {}", e.without_url())))?;

        if !response.ok {
            return Err(self.failed(
                response
                    .description
                    .unwrap_or_else(|| "request rejected".to_string()),
            ));
        }
        Ok(Delivery::Sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use remindly_core::models::NotificationKind;

    fn channel() -> TelegramChannel {
        TelegramChannel::new(TelegramConfig {
            bot_token: "123:abc".into(),
            api_base: "http://127.0.0.1:9".into(),
            timeout: Duration::from_millis(200),
        })
        .unwrap()
    }

    fn notification() -> Notification {
        Notification {
            kind: NotificationKind::Reminder,
            subject_id: "p1".into(),
            reference_date: NaiveDate::from_ymd_opt(2024, 3, 11).unwrap(),
            title: "Upcoming payment: Rent".into(),
            body: "Rent is due tomorrow.".into(),
        }
    }

    #[test]
    fn test_send_message_url() {
        let config = TelegramConfig {
            bot_token: "123:abc".into(),
            api_base: "https://api.telegram.org/".into(),
            timeout: Duration::from_secs(1),
        };
        assert_eq!(config.send_message_url(), "https://api.telegram.org/bot123:abc/sendMessage");
    }

    #[test]
    fn test_skipped_when_disabled_or_unconfigured() {
        let channel = channel();
        let disabled = NotificationSettings {
            telegram_enabled: false,
            telegram_chat_id: Some("42".into()),
            ..Default::default()
        };
        assert_eq!(channel.send(&notification(), &disabled).unwrap(), Delivery::Skipped);

        let no_chat = NotificationSettings {
            telegram_enabled: true,
            ..Default::default()
        };
        assert_eq!(channel.send(&notification(), &no_chat).unwrap(), Delivery::Skipped);
    }

    #[test]
    fn test_unreachable_api_is_channel_error() {
        let settings = NotificationSettings {
            telegram_enabled: true,
            telegram_chat_id: Some("42".into()),
            ..Default::default()
        };
        let err = channel().send(&notification(), &settings).unwrap_err();
        assert!(matches!(err, DispatchError::Channel { ref channel, .. } if channel == "telegram"));
        assert!(!err.to_string().contains("123:abc"));
    }
}
