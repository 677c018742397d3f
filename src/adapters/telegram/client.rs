//! Telegram Bot API client over reqwest. Implements ChannelPort and NotifierPort.
//!
//! Input is long-polled with `getUpdates`; only the admin chat may drive the bot.
//! Messages from anyone else are reported to the admin and otherwise ignored.

use crate::adapters::telegram::mapper::{ApiResponse, Update, preformatted, route_updates};
use crate::domain::DomainError;
use crate::ports::{ChannelPort, NotifierPort};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const API_BASE: &str = "https://api.telegram.org";
/// Long-poll timeout passed to `getUpdates`.
const POLL_TIMEOUT_SECS: u64 = 50;

/// Bot bound to one admin chat.
pub struct TelegramBot {
    client: Client,
    base_url: String,
    admin_chat_id: i64,
    offset: Mutex<i64>,
    pending: Mutex<VecDeque<String>>,
}

impl TelegramBot {
    pub fn new(token: &str, admin_chat_id: i64) -> Self {
        Self::with_base_url(API_BASE, token, admin_chat_id)
    }

    /// Point the bot at another Bot API server (self-hosted `telegram-bot-api`).
    pub fn with_base_url(base: &str, token: &str, admin_chat_id: i64) -> Self {
        Self {
            client: Client::new(),
            base_url: format!("{}/bot{}", base.trim_end_matches('/'), token),
            admin_chat_id,
            offset: Mutex::new(0),
            pending: Mutex::new(VecDeque::new()),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    /// Decode a Bot API envelope. 401/404 mean a bad token: the channel will never recover.
    async fn decode<T: DeserializeOwned>(
        res: reqwest::Response,
        method: &str,
    ) -> Result<T, DomainError> {
        let status = res.status();
        let body: ApiResponse<T> = res
            .json()
            .await
            .map_err(|e| DomainError::Channel(format!("{}: bad response ({}): {}", method, status, e)))?;
        match (body.ok, body.result) {
            (true, Some(result)) => Ok(result),
            _ => {
                let description = body.description.unwrap_or_else(|| "unknown".to_string());
                let message = format!("{} failed ({}): {}", method, status, description);
                match body.error_code {
                    Some(401) | Some(404) => Err(DomainError::ChannelClosed(message)),
                    _ => Err(DomainError::Channel(message)),
                }
            }
        }
    }

    async fn send_message(&self, text: &str, parse_mode: Option<&str>) -> Result<(), DomainError> {
        let mut body = serde_json::json!({
            "chat_id": self.admin_chat_id,
            "text": text,
        });
        if let Some(mode) = parse_mode {
            body["parse_mode"] = serde_json::Value::String(mode.to_string());
        }
        let res = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| DomainError::Channel(format!("sendMessage request failed: {}", e)))?;
        let _: serde_json::Value = Self::decode(res, "sendMessage").await?;
        Ok(())
    }

    /// One long-poll round. Admin texts are queued; strangers are reported.
    async fn poll(&self) -> Result<(), DomainError> {
        let mut offset = self.offset.lock().await;
        let res = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", POLL_TIMEOUT_SECS.to_string()),
                ("allowed_updates", r#"["message"]"#.to_string()),
            ])
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 10))
            .send()
            .await
            .map_err(|e| DomainError::Channel(format!("getUpdates request failed: {}", e)))?;
        let updates: Vec<Update> = Self::decode(res, "getUpdates").await?;

        let routed = route_updates(updates, self.admin_chat_id);
        if let Some(next) = routed.next_offset {
            *offset = next;
        }
        drop(offset);

        for notice in routed.stranger_notices {
            warn!("message from unknown chat");
            if let Err(e) = self.send_message(&notice, None).await {
                warn!(error = %e, "failed to report unknown sender");
            }
        }
        if !routed.admin_texts.is_empty() {
            debug!(count = routed.admin_texts.len(), "admin messages received");
            self.pending.lock().await.extend(routed.admin_texts);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ChannelPort for TelegramBot {
    async fn send(&self, text: &str) -> Result<(), DomainError> {
        self.send_message(text, None).await
    }

    async fn receive(&self) -> Result<String, DomainError> {
        loop {
            if let Some(text) = self.pending.lock().await.pop_front() {
                return Ok(text);
            }
            self.poll().await?;
        }
    }
}

#[async_trait::async_trait]
impl NotifierPort for TelegramBot {
    async fn send_preformatted(&self, text: &str) -> Result<(), DomainError> {
        self.send_message(&preformatted(text), Some("MarkdownV2"))
            .await
            .map_err(|e| DomainError::Notifier(e.to_string()))
    }

    async fn send_document(&self, path: &Path, caption: &str) -> Result<(), DomainError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| DomainError::Notifier(format!("{}: {}", path.display(), e)))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report.csv".to_string());
        let form = Form::new()
            .text("chat_id", self.admin_chat_id.to_string())
            .text("caption", caption.to_string())
            .part("document", Part::bytes(bytes).file_name(file_name.clone()));

        let res = self
            .client
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| DomainError::Notifier(format!("sendDocument request failed: {}", e)))?;
        let _: serde_json::Value = Self::decode(res, "sendDocument")
            .await
            .map_err(|e| DomainError::Notifier(e.to_string()))?;
        info!(file = %file_name, "document sent to admin chat");
        Ok(())
    }
}
