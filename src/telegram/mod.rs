//! # Telegram transport
//!
//! [ChatTransport] over the Telegram Bot API using `getUpdates` long
//! polling. Only private chats are served, so a chat id is the user id.
//!
//! The transport remembers the last message it sent to (or received a
//! button press on from) each user; `edit_last_message` edits that one and
//! falls back to sending a fresh message when it cannot.
//!
//! The bot token is part of every request URL, so URLs are never logged.
pub mod types;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::bot::transport::{ChatTransport, InboundEvent, Keyboard};
use crate::config::TelegramConfig;
use crate::profile::UserId;
use types::*;

const MAX_BACKOFF: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub struct TelegramTransport {
    client: reqwest::Client,
    base_url: String,
    poll_timeout: u64,
    last_message: Mutex<HashMap<UserId, i64>>,
}

impl TelegramTransport {
    pub fn new(token: &str, config: &TelegramConfig) -> Result<Self> {
        if token.trim().is_empty() {
            return Err(anyhow!("bot token is empty; set BOT_TOKEN or bot.token"));
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;
        Ok(Self {
            client,
            base_url: format!("{}/bot{}", config.api_base.trim_end_matches('/'), token.trim()),
            poll_timeout: config.poll_timeout_seconds,
            last_message: Mutex::new(HashMap::new()),
        })
    }

    async fn call<B, T>(&self, method: &str, body: &B, timeout: Duration) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| anyhow!("{} request failed: {}", method, e.without_url()))?;

        let parsed: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| anyhow!("{}: failed to parse response: {}", method, e.without_url()))?;

        match (parsed.ok, parsed.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(anyhow!(
                "{} failed ({}): {}",
                method,
                parsed.error_code.unwrap_or_default(),
                parsed.description.unwrap_or_else(|| "no description".to_string())
            )),
        }
    }

    /// Check the token and return the bot's username.
    pub async fn get_me(&self) -> Result<String> {
        let me: BotUser = self.call("getMe", &serde_json::json!({}), REQUEST_TIMEOUT).await?;
        Ok(me.username.unwrap_or_else(|| me.id.to_string()))
    }

    fn remember(&self, user: UserId, message_id: i64) {
        if let Ok(mut map) = self.last_message.lock() {
            map.insert(user, message_id);
        }
    }

    fn last_for(&self, user: UserId) -> Option<i64> {
        self.last_message.lock().ok().and_then(|m| m.get(&user).copied())
    }

    async fn poll_once(&self, offset: i64) -> Result<Vec<Update>> {
        let request = GetUpdates {
            offset,
            timeout: self.poll_timeout,
            allowed_updates: &["message", "callback_query"],
        };
        let wait = Duration::from_secs(self.poll_timeout) + REQUEST_TIMEOUT;
        self.call("getUpdates", &request, wait).await
    }

    /// Long-poll for updates and forward them to `tx` until it closes.
    pub fn spawn_poller(self: &Arc<Self>, tx: mpsc::UnboundedSender<InboundEvent>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut offset = 0i64;
            let mut backoff = Duration::from_secs(1);
            loop {
                if tx.is_closed() {
                    debug!("event receiver gone; poller exiting");
                    return;
                }
                let updates = match this.poll_once(offset).await {
                    Ok(updates) => {
                        backoff = Duration::from_secs(1);
                        updates
                    }
                    Err(e) => {
                        warn!("getUpdates failed: {:#}; retrying in {}s", e, backoff.as_secs());
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                        continue;
                    }
                };
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    let Some(decoded) = update.decode() else {
                        debug!("skipping update {}", update.update_id);
                        continue;
                    };
                    if let Some(message_id) = decoded.source_message {
                        this.remember(decoded.event.user_id, message_id);
                    }
                    if tx.send(decoded.event).is_err() {
                        info!("event receiver closed; poller exiting");
                        return;
                    }
                }
            }
        })
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_text(&self, user: UserId, text: &str, keyboard: Option<&Keyboard>) -> Result<()> {
        let body = SendMessage {
            chat_id: user,
            text,
            reply_markup: keyboard.map(InlineKeyboardMarkup::from),
        };
        let sent: Message = self.call("sendMessage", &body, REQUEST_TIMEOUT).await?;
        self.remember(user, sent.message_id);
        Ok(())
    }

    async fn edit_last_message(
        &self,
        user: UserId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<()> {
        let Some(message_id) = self.last_for(user) else {
            return self.send_text(user, text, keyboard).await;
        };
        let body = EditMessageText {
            chat_id: user,
            message_id,
            text,
            reply_markup: keyboard.map(InlineKeyboardMarkup::from),
        };
        // editMessageText returns the message, or `true` for inline messages.
        match self
            .call::<_, serde_json::Value>("editMessageText", &body, REQUEST_TIMEOUT)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("message is not modified") => Ok(()),
            Err(e) => {
                debug!("edit failed for user {}, sending instead: {:#}", user, e);
                self.send_text(user, text, keyboard).await
            }
        }
    }

    async fn answer_callback(&self, callback_id: &str, toast: Option<&str>) -> Result<()> {
        let body = AnswerCallbackQuery {
            callback_query_id: callback_id,
            text: toast,
        };
        let _: bool = self.call("answerCallbackQuery", &body, REQUEST_TIMEOUT).await?;
        Ok(())
    }
}
