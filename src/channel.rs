//! Channel lookups and one-shot message sends over the REST API.

use serde_json::json;

use crate::client::{ApiClient, RequestClient};
use crate::config::SessionContext;
use crate::error::{Error, Result};
use crate::types::{Channel, Message};

const SUCCESS: u16 = 200;

/// Resolves channel identifiers to descriptors before a stream is opened.
pub struct ChannelResolver<C: RequestClient> {
    client: C,
}

impl ChannelResolver<ApiClient> {
    /// A resolver speaking to the API root and token of `context`.
    pub fn for_context(context: &SessionContext) -> Result<Self> {
        let client = ApiClient::new(
            context.api_url().clone(),
            Some(context.token().to_string()),
        )?;
        Ok(Self::new(client))
    }
}

impl<C: RequestClient> ChannelResolver<C> {
    /// Create a resolver on top of `client`.
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// The underlying request client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Look up the channel with `channel_id`.
    pub async fn resolve(&self, channel_id: &str) -> Result<Channel> {
        resolve(&self.client, channel_id).await
    }

    /// Post `content` to the channel with `channel_id`.
    pub async fn send_message(&self, channel_id: &str, content: &str) -> Result<Message> {
        send_message(&self.client, channel_id, content).await
    }
}

/// Fetch the descriptor of `channel_id` with a single `GET channel/{id}`.
pub async fn resolve<C: RequestClient + ?Sized>(client: &C, channel_id: &str) -> Result<Channel> {
    let channel_id = require_id(channel_id)?;
    tracing::debug!(channel_id, "resolving channel");
    let channel: Channel = client.get(&["channel", channel_id]).await?.payload(SUCCESS)?;
    tracing::debug!(channel_id, name = %channel.name, owner = %channel.owner, "resolved channel");
    Ok(channel)
}

/// Send `content` to `channel_id` and return the message the server stored.
///
/// Content is trimmed first; nothing is sent when it ends up empty.
pub async fn send_message<C: RequestClient + ?Sized>(
    client: &C,
    channel_id: &str,
    content: &str,
) -> Result<Message> {
    let channel_id = require_id(channel_id)?;
    let content = content.trim();
    if content.is_empty() {
        return Err(Error::validation(
            "message content must not be empty",
            Some("message".to_string()),
        ));
    }
    tracing::debug!(channel_id, "sending message");
    let body = json!({ "content": content });
    client
        .post(&["channel", channel_id, "send-message"], &body)
        .await?
        .payload(SUCCESS)
}

fn require_id(channel_id: &str) -> Result<&str> {
    let channel_id = channel_id.trim();
    if channel_id.is_empty() {
        return Err(Error::validation(
            "channel id must not be empty",
            Some("id".to_string()),
        ));
    }
    Ok(channel_id)
}
