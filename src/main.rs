// This is the entry point of the link moderation bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `discord/` = Discord-specific adapters (commands, events, gateway)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Register commands and event handlers

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with a pile of mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;

use crate::core::moderation::{parse_id_csv, ModerationConfig, ModerationService, SweepCoordinator};
use crate::discord::moderation::{commands, link_handler};
use crate::discord::moderation::serenity_gateway::SerenityGateway;
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;
use std::sync::Arc;

/// Event handler for non-command Discord events. Message creates and edits
/// both funnel into the same moderation path; failures are logged and never
/// allowed to unwind into the dispatch loop.
async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Message { new_message } => {
            // Ignore bot messages (including our own warnings)
            if new_message.author.bot {
                return Ok(());
            }

            // DM ping - a cheap liveness probe for operators.
            if new_message.guild_id.is_none() && new_message.content == "!ping" {
                if let Err(e) = new_message.reply(&ctx.http, "🏓 Pong!").await {
                    tracing::warn!("Failed to answer DM ping: {}", e);
                }
                return Ok(());
            }

            if let Err(e) = link_handler::handle_message(ctx, data, new_message).await {
                tracing::error!("Error handling message for link moderation: {}", e);
            }
        }
        serenity::FullEvent::MessageUpdate {
            old_if_available,
            new,
            event,
        } => {
            if let Err(e) = link_handler::handle_message_edit(
                ctx,
                data,
                old_if_available.as_ref(),
                new.as_ref(),
                event,
            )
            .await
            {
                tracing::error!("Error handling message edit for link moderation: {}", e);
            }
        }
        _ => {}
    }

    Ok(())
}

/// Command-dispatch error hook. Bad `.check foo` style input gets a
/// transient usage note instead of poise's default reply.
async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::ArgumentParse { ctx, .. } => {
            if let Err(e) = commands::send_transient_reply(ctx, commands::USAGE).await {
                tracing::warn!("Failed to send usage notice: {}", e);
            }
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                tracing::error!("Error while handling error: {}", e);
            }
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    // Get Discord bot token from environment
    let token = std::env::var("DISCORD_TOKEN").expect(
        "Missing DISCORD_TOKEN environment variable! Create a .env file with your bot token.",
    );

    // ========================================================================
    // CONFIGURATION
    // ========================================================================
    // Read once here; the config is immutable for the life of the process.

    let defaults = ModerationConfig::default();
    let config = ModerationConfig {
        restricted_channel_ids: std::env::var("RESTRICTED_CHANNEL_IDS")
            .map(|raw| parse_id_csv(&raw))
            .unwrap_or_default(),
        privileged_user_ids: std::env::var("BOT_ADMIN_IDS")
            .map(|raw| parse_id_csv(&raw))
            .unwrap_or_default(),
        warning_cooldown_ms: env_u64("WARNING_COOLDOWN_MS", defaults.warning_cooldown_ms),
        warning_lifetime_ms: env_u64("WARNING_LIFETIME_MS", defaults.warning_lifetime_ms),
        sweep_delete_delay_ms: env_u64("SWEEP_DELETE_DELAY_MS", defaults.sweep_delete_delay_ms),
    };

    if config.restricted_channel_ids.is_empty() {
        // Not an error: the bot just idles until channels are configured.
        tracing::warn!("No restricted channels configured; link moderation will never trigger");
    }

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Create our services with their dependencies.
    // This is the "composition root" where we wire everything together.

    let moderation_service = Arc::new(ModerationService::new(config));
    let sweep_coordinator = Arc::new(SweepCoordinator::new(Arc::clone(&moderation_service)));

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================

    let intents = serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT // Required to read message content
        | serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::DIRECT_MESSAGES;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![commands::check()],
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(".".to_string()),
                ..Default::default()
            },
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                println!("🤖 Bot is starting up...");
                tracing::info!("Logged in as {}", ready.user.name);

                // Register slash commands globally (can take up to an hour
                // to propagate; the `.check` prefix form works immediately).
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                ctx.set_presence(
                    Some(serenity::ActivityData::watching("for links")),
                    serenity::OnlineStatus::Online,
                );

                let data = Data {
                    moderation: Arc::clone(&moderation_service),
                    sweeps: Arc::clone(&sweep_coordinator),
                    gateway: Arc::new(SerenityGateway::new(ctx.http.clone(), ctx.cache.clone())),
                };

                let restricted = &data.moderation.config().restricted_channel_ids;
                if !restricted.is_empty() {
                    let channels: Vec<String> =
                        restricted.iter().map(|id| id.to_string()).collect();
                    tracing::info!("Link deletion active in channels: {}", channels.join(", "));
                }

                // Hourly full clear of the warning cooldown ledger to bound
                // memory growth from distinct-actor churn.
                let moderation = Arc::clone(&data.moderation);
                tokio::spawn(async move {
                    use std::time::Duration as StdDuration;
                    use tokio::time::sleep;

                    loop {
                        sleep(StdDuration::from_secs(60 * 60)).await;
                        let cleared = moderation.clear_cooldowns();
                        tracing::debug!(cleared, "Warning cooldown ledger cleared");
                    }
                });

                println!("🚀 Bot is ready!");
                Ok(data)
            })
        })
        .build();

    // Create the client and start the bot
    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await
        .expect("Error creating client");

    // Disconnect the gateway cleanly on Ctrl-C instead of letting the
    // session time out server-side.
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for shutdown signal");
        tracing::info!("Shutdown signal received, disconnecting");
        shard_manager.shutdown_all().await;
    });

    client.start().await.expect("Error running bot");
}
