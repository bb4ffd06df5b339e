//! Chat transport abstraction: inbound events and the outbound calls the
//! router makes.
use anyhow::Result;
use async_trait::async_trait;

use super::action::Action;
use crate::profile::UserId;

/// Inline button: label plus the action it triggers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: Action,
}

impl Button {
    pub fn new(label: impl Into<String>, action: Action) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

/// Buttons rendered one per row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub buttons: Vec<Button>,
}

impl Keyboard {
    pub fn new(buttons: Vec<Button>) -> Self {
        Self { buttons }
    }

    pub fn contains(&self, action: Action) -> bool {
        self.buttons.iter().any(|b| b.action == action)
    }
}

/// Outbound side of the chat platform.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a new message to the user's private chat.
    async fn send_text(&self, user: UserId, text: &str, keyboard: Option<&Keyboard>) -> Result<()>;

    /// Replace the bot's most recent message to this user. Implementations
    /// fall back to sending when there is nothing to edit.
    async fn edit_last_message(
        &self,
        user: UserId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<()>;

    /// Acknowledge a button press, optionally with a short toast.
    async fn answer_callback(&self, callback_id: &str, toast: Option<&str>) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// `/name args`; the name is lowercased and stripped of `@botname`.
    /// `raw` is the message exactly as typed.
    Command {
        name: String,
        args: String,
        raw: String,
    },
    /// Button press with the platform's callback id and the raw selector.
    Callback { id: String, data: String },
    Text(String),
}

/// Dispatch key for [EventKind].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTag {
    Command,
    Callback,
    Text,
}

impl EventKind {
    pub fn tag(&self) -> EventTag {
        match self {
            EventKind::Command { .. } => EventTag::Command,
            EventKind::Callback { .. } => EventTag::Callback,
            EventKind::Text(_) => EventTag::Text,
        }
    }
}

/// One thing a user did in the chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub user_id: UserId,
    pub kind: EventKind,
}

impl InboundEvent {
    /// Classify a text message as a slash command or plain text.
    pub fn from_text(user_id: UserId, text: &str) -> Self {
        let kind = match text.strip_prefix('/') {
            Some(rest) if rest.starts_with(|c: char| c.is_ascii_alphanumeric()) => {
                let (head, args) = match rest.split_once(char::is_whitespace) {
                    Some((h, a)) => (h, a.trim()),
                    None => (rest, ""),
                };
                let name = head.split('@').next().unwrap_or(head).to_ascii_lowercase();
                EventKind::Command {
                    name,
                    args: args.to_string(),
                    raw: text.to_string(),
                }
            }
            _ => EventKind::Text(text.to_string()),
        };
        Self { user_id, kind }
    }

    pub fn callback(user_id: UserId, id: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            user_id,
            kind: EventKind::Callback {
                id: id.into(),
                data: data.into(),
            },
        }
    }

    /// The message as the user typed it, for commands and plain text.
    pub fn raw_text(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Command { raw, .. } => Some(raw),
            EventKind::Text(text) => Some(text),
            EventKind::Callback { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_with_bot_suffix() {
        let ev = InboundEvent::from_text(1, "/Start@RconBot");
        assert_eq!(
            ev.kind,
            EventKind::Command {
                name: "start".into(),
                args: String::new(),
                raw: "/Start@RconBot".into()
            }
        );
        let ev = InboundEvent::from_text(1, "/Say  hello world");
        assert!(matches!(
            &ev.kind,
            EventKind::Command { name, args, .. } if name == "say" && args == "hello world"
        ));
        // Forwarded text keeps case and spacing.
        assert_eq!(ev.raw_text(), Some("/Say  hello world"));
    }

    #[test]
    fn plain_text_and_lone_slash() {
        assert_eq!(InboundEvent::from_text(1, "list").kind, EventKind::Text("list".into()));
        assert_eq!(InboundEvent::from_text(1, "/").kind, EventKind::Text("/".into()));
        assert_eq!(InboundEvent::from_text(1, "/ x").kind.tag(), EventTag::Text);
    }
}
