use serde::{Deserialize, Serialize};

use crate::types::User;

/// Channel metadata returned by `GET /channel/{id}`.
///
/// Fetched once before a stream is opened and read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Channel {
    /// Unique identifier of the channel.
    pub id: String,

    /// Human-readable channel name.
    pub name: String,

    /// The user who created the channel.
    pub owner: User,

    /// Creation timestamp exactly as the API formats it.
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialization() {
        let json = serde_json::json!({
            "id": "c1",
            "name": "general",
            "owner": {"id": "u1", "username": "alice", "tag": "0001"},
            "createdAt": "2024-01-01"
        });
        let channel: Channel = serde_json::from_value(json).unwrap();
        assert_eq!(channel.name, "general");
        assert_eq!(channel.owner.to_string(), "alice.0001");
        assert_eq!(channel.created_at.as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn created_at_is_optional() {
        let json = serde_json::json!({
            "id": "c1",
            "name": "general",
            "owner": {"id": "u1", "username": "alice", "tag": "0001"}
        });
        let channel: Channel = serde_json::from_value(json).unwrap();
        assert!(channel.created_at.is_none());
        let back = serde_json::to_value(&channel).unwrap();
        assert!(back.get("createdAt").is_none());
    }

    #[test]
    fn owner_is_required() {
        let json = serde_json::json!({"id": "c1", "name": "general"});
        assert!(serde_json::from_value::<Channel>(json).is_err());
    }
}
