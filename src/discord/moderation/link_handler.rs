// Discord-specific link handling - feeds message events through the policy
// engine and enacts its decisions.
//
// Side effects happen strictly after the decision: delete the offending
// message, send the warning (if any), schedule the warning's own removal.
// Platform failures are logged and dropped here; nothing propagates back
// into the event-dispatch loop.

use crate::core::moderation::{ActorRole, ChannelGateway, GatewayError, MessageEvent};
use crate::discord::moderation::serenity_gateway::member_is_admin;
use crate::discord::Data;
use anyhow::Result;
use chrono::Utc;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use std::time::Duration;

/// Run one freshly created message through the moderation policy.
pub async fn handle_message(
    ctx: &serenity::Context,
    data: &Data,
    msg: &serenity::Message,
) -> Result<()> {
    if msg.author.bot {
        return Ok(());
    }

    enforce(data, message_event_from(ctx, msg)).await
}

/// Run an edited message through the exact same policy as a new one: an
/// edit that introduces a link is an offense, an edit that removes one
/// falls through with no action.
pub async fn handle_message_edit(
    ctx: &serenity::Context,
    data: &Data,
    old: Option<&serenity::Message>,
    new: Option<&serenity::Message>,
    event: &serenity::MessageUpdateEvent,
) -> Result<()> {
    // Prefer the full updated message when the cache provides it.
    if let Some(updated) = new {
        if updated.author.bot {
            return Ok(());
        }
        return enforce(data, message_event_from(ctx, updated)).await;
    }

    // Otherwise rebuild what we can from the raw update event.
    let body = match &event.content {
        Some(content) => content.clone(),
        None => return Ok(()),
    };
    let author = match event.author.as_ref().or_else(|| old.map(|m| &m.author)) {
        Some(author) => author,
        // No author anywhere means we cannot attribute the edit; skip it.
        None => return Ok(()),
    };
    if author.bot {
        return Ok(());
    }

    let is_admin = event
        .guild_id
        .map(|gid| member_is_admin(&ctx.cache, gid, author.id))
        .unwrap_or(false);

    let moderation_event = MessageEvent {
        message_id: event.id.get(),
        channel_id: event.channel_id.get(),
        author_id: author.id.get(),
        is_bot_author: author.bot,
        body,
        actor_role: ActorRole {
            is_administrator: is_admin,
        },
    };

    enforce(data, moderation_event).await
}

fn message_event_from(ctx: &serenity::Context, msg: &serenity::Message) -> MessageEvent {
    // Best-effort admin detection via the cache; DMs have no guild and no
    // elevated roles.
    let is_admin = msg
        .guild_id
        .map(|gid| member_is_admin(&ctx.cache, gid, msg.author.id))
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

/// Compute the decision and apply it through the gateway.
async fn enforce(data: &Data, event: MessageEvent) -> Result<()> {
    let decision = data.moderation.decide(&event, Utc::now());

    if !decision.should_delete {
        tracing::trace!(
            message_id = event.message_id,
            reason = %decision.reason,
            "Message kept"
        );
        return Ok(());
    }

    match data.gateway.delete_message(event.channel_id, event.message_id).await {
        Ok(()) => tracing::info!(
            author_id = event.author_id,
            channel_id = event.channel_id,
            reason = %decision.reason,
            "Deleted link message"
        ),
        // Someone (or the platform) removed it first; that is fine.
        Err(GatewayError::NotFound) => tracing::debug!(
            message_id = event.message_id,
            "Link message was already gone"
        ),
        // The message may survive; accepted risk, the warning still stands.
        Err(err) => tracing::warn!(
            message_id = event.message_id,
            "Failed to delete link message: {err}"
        ),
    }

    if decision.should_warn {
        send_transient_warning(data, event.channel_id, event.author_id).await;
    }

    Ok(())
}

/// Warn the author in-channel, then retract the warning after its
/// configured lifetime. The retraction is fire-and-forget: it never blocks
/// the event handler and its failure is inconsequential.
async fn send_transient_warning(data: &Data, channel_id: u64, author_id: u64) {
    let text = format!("<@{}>, links are not allowed here.", author_id);
    let warning_id = match data.gateway.send_message(channel_id, &text).await {
        Ok(id) => id,
        Err(err) => {
            tracing::warn!(channel_id, "Failed to send link warning: {err}");
            return;
        }
    };

    let gateway = Arc::clone(&data.gateway);
    let lifetime = Duration::from_millis(data.moderation.config().warning_lifetime_ms);
    tokio::spawn(async move {
        tokio::time::sleep(lifetime).await;
        match gateway.delete_message(channel_id, warning_id).await {
            Ok(()) | Err(GatewayError::NotFound) => {}
            Err(err) => tracing::debug!("Failed to retract link warning: {err}"),
        }
    });
}
