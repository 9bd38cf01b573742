//! The ordered conversation history.
//!
//! The transcript is append-only with two exceptions: the last message may be
//! rewritten while it is the open assistant message of an in-flight turn, and
//! the tail may be removed to roll back a failed turn.

use crate::error::{Error, Result};
use crate::types::Message;

/// Ordered sequence of messages; insertion order is conversation order.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    // Whether the last message is an assistant message still receiving text.
    open: bool,
}

impl Transcript {
    /// Creates an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message and returns the new count.
    ///
    /// Appending seals whatever was open before. An appended assistant message
    /// starts out open so that [`Transcript::replace_last`] can fill it in.
    pub fn append(&mut self, message: Message) -> usize {
        self.open = message.is_assistant();
        self.messages.push(message);
        self.messages.len()
    }

    /// Replaces the content of the open assistant message.
    ///
    /// Fails without modifying anything if the transcript is empty, the last
    /// message is not from the assistant, or the last message has been sealed.
    pub fn replace_last(&mut self, content: impl Into<String>) -> Result<()> {
        let Some(last) = self.messages.last_mut() else {
            return Err(Error::transcript("cannot replace content of an empty transcript"));
        };
        if !last.is_assistant() {
            return Err(Error::transcript("last message is not an assistant message"));
        }
        if !self.open {
            return Err(Error::transcript("last assistant message is sealed"));
        }
        last.content = content.into();
        Ok(())
    }

    /// Marks the open assistant message as complete.
    ///
    /// Returns false if nothing was open.
    pub fn seal_last(&mut self) -> bool {
        std::mem::replace(&mut self.open, false)
    }

    /// Removes and returns the final message.
    pub fn remove_last(&mut self) -> Result<Message> {
        let message = self
            .messages
            .pop()
            .ok_or_else(|| Error::transcript("cannot remove from an empty transcript"))?;
        self.open = false;
        Ok(message)
    }

    /// Removes every message.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.open = false;
    }

    /// Returns the messages in conversation order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the most recent message.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Returns true if the last message is an open assistant message.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Returns the number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if there are no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
