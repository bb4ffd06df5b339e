//! Bot API wire types: only the fields the bot reads or writes.
use serde::{Deserialize, Serialize};

use crate::bot::transport::{InboundEvent, Keyboard};

#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct BotUser {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<BotUser>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: BotUser,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

/// What an update means to the bot, plus the message a callback came from.
#[derive(Debug, PartialEq, Eq)]
pub struct Decoded {
    pub event: InboundEvent,
    pub source_message: Option<i64>,
}

impl Update {
    /// Private-chat text and button presses; everything else is `None`.
    pub fn decode(&self) -> Option<Decoded> {
        if let Some(msg) = &self.message {
            if msg.chat.kind != "private" {
                return None;
            }
            let from = msg.from.as_ref()?;
            let text = msg.text.as_deref()?;
            return Some(Decoded {
                event: InboundEvent::from_text(from.id, text),
                source_message: None,
            });
        }
        if let Some(cb) = &self.callback_query {
            if let Some(msg) = &cb.message {
                if msg.chat.kind != "private" {
                    return None;
                }
            }
            return Some(Decoded {
                event: InboundEvent::callback(
                    cb.from.id,
                    cb.id.clone(),
                    cb.data.clone().unwrap_or_default(),
                ),
                source_message: cb.message.as_ref().map(|m| m.message_id),
            });
        }
        None
    }
}

#[derive(Debug, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Debug, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

impl From<&Keyboard> for InlineKeyboardMarkup {
    fn from(kb: &Keyboard) -> Self {
        InlineKeyboardMarkup {
            inline_keyboard: kb
                .buttons
                .iter()
                .map(|b| {
                    vec![InlineKeyboardButton {
                        text: b.label.clone(),
                        callback_data: b.action.to_string(),
                    }]
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GetUpdates<'a> {
    pub offset: i64,
    pub timeout: u64,
    pub allowed_updates: &'a [&'a str],
}

#[derive(Debug, Serialize)]
pub struct SendMessage<'a> {
    pub chat_id: i64,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
pub struct EditMessageText<'a> {
    pub chat_id: i64,
    pub message_id: i64,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
pub struct AnswerCallbackQuery<'a> {
    pub callback_query_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<&'a str>,
}
