use serde::{Deserialize, Serialize};

use crate::types::User;

/// A chat message, as carried in the `payload` of inbound frames and of
/// send-message responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// The message text.
    pub content: String,

    /// The author of the message.
    pub sender: User,
}

impl Message {
    /// Create a new message.
    pub fn new(content: impl Into<String>, sender: User) -> Self {
        Self {
            content: content.into(),
            sender,
        }
    }
}
