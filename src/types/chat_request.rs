use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Model;

/// The body POSTed to the chat endpoint for one turn.
///
/// The endpoint answers with a streamed text body.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Developer (system) instruction text.
    pub developer_message: String,

    /// The new user message.
    pub user_message: String,

    /// Model identifier.
    pub model: Model,

    /// The credential forwarded to the provider.
    pub api_key: String,
}

impl ChatRequest {
    /// Create a new chat request.
    pub fn new(
        developer_message: impl Into<String>,
        user_message: impl Into<String>,
        model: Model,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            developer_message: developer_message.into(),
            user_message: user_message.into(),
            model,
            api_key: api_key.into(),
        }
    }
}

// Keeps the credential out of logs.
impl fmt::Debug for ChatRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatRequest")
            .field("developer_message", &self.developer_message)
            .field("user_message", &self.user_message)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}
