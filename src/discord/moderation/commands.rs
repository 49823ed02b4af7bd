// Sweep command - retroactive link cleanup, plus the shared poise Data.

use crate::core::moderation::{ModerationService, SweepCoordinator, SweepError, SweepReport};
use crate::discord::moderation::serenity_gateway::SerenityGateway;
use std::sync::Arc;
use std::time::Duration;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// Data that's shared across all commands and event handlers.
pub struct Data {
    pub moderation: Arc<ModerationService>,
    pub sweeps: Arc<SweepCoordinator>,
    pub gateway: Arc<SerenityGateway>,
}

pub(crate) const USAGE: &str = "Usage: `.check <1-100>`";

/// Delete recent link messages from this channel.
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn check(
    ctx: Context<'_>,
    #[description = "How many recent messages to scan (1-100)"] count: Option<u32>,
) -> Result<(), Error> {
    let Some(count) = count else {
        send_transient_reply(ctx, USAGE).await?;
        return Ok(());
    };

    let channel_id = ctx.channel_id().get();
    let requester_id = ctx.author().id.get();

    let outcome = ctx
        .data()
        .sweeps
        .sweep(ctx.data().gateway.as_ref(), channel_id, requester_id, count)
        .await;

    match outcome {
        Ok(report) => {
            ctx.say(render_summary(&report)).await?;
        }
        Err(SweepError::Unauthorized(_)) => {
            send_transient_reply(ctx, "⛔ You are not allowed to run a link sweep.").await?;
        }
        Err(SweepError::InvalidCount(_)) => {
            send_transient_reply(ctx, USAGE).await?;
        }
        Err(SweepError::AlreadyRunning(_)) => {
            send_transient_reply(ctx, "⏳ A sweep is already running in this channel.").await?;
        }
        Err(SweepError::Gateway(err)) => {
            tracing::warn!(channel_id, "Sweep failed: {err}");
            ctx.say("❌ Sweep failed, try again in a moment.").await?;
        }
    }

    Ok(())
}

fn render_summary(report: &SweepReport) -> String {
    if report.deleted == 0 {
        return format!(
            "🔍 Scanned {} messages, found no link messages to delete.",
            report.scanned
        );
    }

    let mut summary = format!(
        "🧹 Deleted {} link message{} out of {} scanned.",
        report.deleted,
        if report.deleted == 1 { "" } else { "s" },
        report.scanned
    );
    if report.failed > 0 {
        summary.push_str(&format!(" Skipped {} failed deletion(s).", report.failed));
    }
    summary
}

/// Reply and schedule the reply's own deletion so usage and permission
/// notices don't linger in the channel.
pub async fn send_transient_reply(ctx: Context<'_>, text: &str) -> Result<(), Error> {
    let reply = ctx.say(text).await?;
    let message = reply.into_message().await?;

    let http = ctx.serenity_context().http.clone();
    let lifetime = Duration::from_millis(ctx.data().moderation.config().warning_lifetime_ms);
    tokio::spawn(async move {
        tokio::time::sleep(lifetime).await;
        let _ = message.delete(&http).await;
    });

    Ok(())
}
