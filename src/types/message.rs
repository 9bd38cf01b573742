use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// The author of a message in the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Text typed by the user.
    User,
    /// Text produced by the model.
    Assistant,
    /// Developer (system) instructions.
    Developer,
}

/// One turn in the conversation.
///
/// The timestamp is fixed when the message is created. Content is only ever
/// rewritten by the transcript while the message is the open assistant message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who wrote the message.
    pub role: Role,

    /// The text body.
    pub content: String,

    /// Creation time.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl Message {
    /// Create a message stamped with the current time.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an empty assistant message, ready to receive streamed text.
    pub fn assistant() -> Self {
        Self::new(Role::Assistant, String::new())
    }

    /// Returns true if this message was written by the model.
    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}
