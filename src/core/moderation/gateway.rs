// Gateway capability port - the slice of the messaging platform the
// moderation core drives. The Discord implementation lives in the discord
// layer; tests use an in-memory fake.

use super::moderation_models::MessageEvent;
use async_trait::async_trait;
use thiserror::Error;

/// Platform failures, reduced to what the policy cares about.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The target message (or channel) no longer exists. Treated as a
    /// benign outcome everywhere, never as a failure.
    #[error("message no longer exists")]
    NotFound,

    #[error("platform rate limit hit")]
    RateLimited,

    #[error("platform error: {0}")]
    Platform(String),
}

/// What the moderation core needs from the messaging platform.
#[async_trait]
pub trait ChannelGateway: Send + Sync {
    /// Fetch up to `limit` most recent messages in a channel.
    async fn fetch_recent_messages(
        &self,
        channel_id: u64,
        limit: u8,
    ) -> Result<Vec<MessageEvent>, GatewayError>;

    /// Delete one message. Implementations surface "already deleted" as
    /// `GatewayError::NotFound`.
    async fn delete_message(&self, channel_id: u64, message_id: u64) -> Result<(), GatewayError>;

    /// Send a plain text message, returning the new message's id.
    async fn send_message(&self, channel_id: u64, text: &str) -> Result<u64, GatewayError>;
}
