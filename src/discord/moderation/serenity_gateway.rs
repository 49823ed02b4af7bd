// Serenity-backed implementation of the core's gateway port.
//
// Everything here is best-effort translation: HTTP errors are folded into
// the core's small `GatewayError` taxonomy, and role classification leans
// on the cache (an uncached member simply counts as not privileged).

use crate::core::moderation::{ActorRole, ChannelGateway, GatewayError, MessageEvent};
use async_trait::async_trait;
use serenity::all::{Cache, ChannelId, GetMessages, GuildId, Http, Message, MessageId, UserId};
use serenity::http::HttpError;
use serenity::Error as SerenityError;
use std::sync::Arc;

/// Gateway adapter over serenity's HTTP client and cache.
pub struct SerenityGateway {
    http: Arc<Http>,
    cache: Arc<Cache>,
}

impl SerenityGateway {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>) -> Self {
        Self { http, cache }
    }

    /// Find the cached guild owning a channel. REST-fetched messages carry
    /// no guild id, so the cache is the only source for role classification
    /// during a sweep.
    fn guild_for_channel(&self, channel_id: ChannelId) -> Option<GuildId> {
        self.cache.guilds().into_iter().find(|guild_id| {
            self.cache
                .guild(*guild_id)
                .map(|guild| guild.channels.contains_key(&channel_id))
                .unwrap_or(false)
        })
    }

    fn normalize(&self, msg: &Message, cached_guild: Option<GuildId>) -> MessageEvent {
        let guild_id = msg.guild_id.or(cached_guild);
        let is_admin = guild_id
            .map(|gid| member_is_admin(&self.cache, gid, msg.author.id))
            .unwrap_or(false);

        MessageEvent {
            message_id: msg.id.get(),
            channel_id: msg.channel_id.get(),
            author_id: msg.author.id.get(),
            is_bot_author: msg.author.bot,
            body: msg.content.clone(),
            actor_role: ActorRole {
                is_administrator: is_admin,
            },
        }
    }
}

#[async_trait]
impl ChannelGateway for SerenityGateway {
    async fn fetch_recent_messages(
        &self,
        channel_id: u64,
        limit: u8,
    ) -> Result<Vec<MessageEvent>, GatewayError> {
        let channel = ChannelId::new(channel_id);
        let messages = channel
            .messages(&self.http, GetMessages::new().limit(limit))
            .await
            .map_err(map_platform_error)?;

        let cached_guild = self.guild_for_channel(channel);
        Ok(messages
            .iter()
            .map(|msg| self.normalize(msg, cached_guild))
            .collect())
    }

    async fn delete_message(&self, channel_id: u64, message_id: u64) -> Result<(), GatewayError> {
        self.http
            .delete_message(ChannelId::new(channel_id), MessageId::new(message_id), None)
            .await
            .map_err(map_platform_error)
    }

    async fn send_message(&self, channel_id: u64, text: &str) -> Result<u64, GatewayError> {
        let message = ChannelId::new(channel_id)
            .say(&self.http, text)
            .await
            .map_err(map_platform_error)?;
        Ok(message.id.get())
    }
}

/// Best-effort administrator check using the cache. If the guild or member
/// is not cached, assume no elevated capability.
pub fn member_is_admin(cache: &Cache, guild_id: GuildId, user_id: UserId) -> bool {
    cache
        .guild(guild_id)
        .map(|guild| {
            guild
                .members
                .get(&user_id)
                .map(|member| guild.member_permissions(member).administrator())
                .unwrap_or(false)
        })
        .unwrap_or(false)
}

/// Fold serenity's error tree into the core's taxonomy. 404 means the
/// target is already gone, which callers treat as a benign outcome.
fn map_platform_error(err: SerenityError) -> GatewayError {
    if let SerenityError::Http(HttpError::UnsuccessfulRequest(ref response)) = err {
        match response.status_code.as_u16() {
            404 => return GatewayError::NotFound,
            429 => return GatewayError::RateLimited,
            _ => {}
        }
    }
    GatewayError::Platform(err.to_string())
}
