//! Conversation turns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::attachment::Attachment;

/// A single turn in a conversation.
///
/// Turns are immutable once appended to a conversation; the conversation
/// hands out clones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Turn {
    /// Create a user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            attachments: Vec::new(),
            timestamp: Some(Utc::now()),
        }
    }

    /// Create an assistant turn.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            attachments: Vec::new(),
            timestamp: Some(Utc::now()),
        }
    }

    /// Attach a media file to this turn.
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Attach several media files to this turn, preserving order.
    pub fn with_attachments(mut self, attachments: impl IntoIterator<Item = Attachment>) -> Self {
        self.attachments.extend(attachments);
        self
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

impl From<&str> for Turn {
    fn from(text: &str) -> Self {
        Self::user(text)
    }
}

impl From<String> for Turn {
    fn from(text: String) -> Self {
        Self::user(text)
    }
}

/// Conversation role.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_serializes_without_empty_attachments() {
        let turn = Turn {
            timestamp: None,
            ..Turn::assistant("hi")
        };
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json, serde_json::json!({"role": "assistant", "text": "hi"}));
    }

    #[test]
    fn role_parses_from_lowercase() {
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }

    #[test]
    fn string_converts_to_user_turn() {
        let turn: Turn = "hello".into();
        assert!(turn.is_user());
        assert_eq!(turn.text, "hello");
    }
}
