use std::fmt;

use serde::{Deserialize, Serialize};

/// A user as the API reports it in channel owners and message senders.
///
/// Users sharing a display name are told apart by their discriminator `tag`,
/// so a user is always shown as `username.tag`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Unique identifier of the user.
    pub id: String,

    /// Display name, not unique on its own.
    pub username: String,

    /// Discriminator tag distinguishing users with the same username.
    pub tag: String,
}

impl User {
    /// Create a new user.
    pub fn new(
        id: impl Into<String>,
        username: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            tag: tag.into(),
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.username, self.tag)
    }
}
