// Moderation domain models - data structures for the link moderation system.
//
// These are pure domain types with no Discord dependencies.
// The Discord layer converts platform events into these and back.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Capability set held by a message author in the channel it was posted to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActorRole {
    pub is_administrator: bool,
}

/// One observed or historical message, normalized away from platform types.
///
/// Constructed from a gateway event or a fetch-batch entry, never mutated,
/// consumed once by the policy engine or the sweep coordinator.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub message_id: u64,
    pub channel_id: u64,
    pub author_id: u64,
    /// Bot-authored events are always ignored (including our own warnings).
    pub is_bot_author: bool,
    /// Text content at the time of observation.
    pub body: String,
    pub actor_role: ActorRole,
}

/// Why the policy engine reached its verdict for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    BotAuthor,
    NotRestrictedChannel,
    NoLinkFound,
    PrivilegedActor,
    /// Removed through the cooldown-free sweep path.
    Deleted,
    /// Removed silently; the author was warned recently in this channel.
    DeletedNoWarnCooldown,
    /// Removed, and a fresh warning was recorded for the author.
    DeletedWithWarning,
}

impl std::fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionReason::BotAuthor => write!(f, "bot author"),
            DecisionReason::NotRestrictedChannel => write!(f, "channel not restricted"),
            DecisionReason::NoLinkFound => write!(f, "no link found"),
            DecisionReason::PrivilegedActor => write!(f, "privileged actor"),
            DecisionReason::Deleted => write!(f, "deleted (sweep)"),
            DecisionReason::DeletedNoWarnCooldown => write!(f, "deleted, warning on cooldown"),
            DecisionReason::DeletedWithWarning => write!(f, "deleted with warning"),
        }
    }
}

/// Output of the policy engine for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModerationDecision {
    pub should_delete: bool,
    /// Only meaningful when `should_delete` is set.
    pub should_warn: bool,
    pub reason: DecisionReason,
}

impl ModerationDecision {
    /// The message stays untouched.
    pub fn keep(reason: DecisionReason) -> Self {
        Self {
            should_delete: false,
            should_warn: false,
            reason,
        }
    }

    /// The message must be removed.
    pub fn delete(reason: DecisionReason, should_warn: bool) -> Self {
        Self {
            should_delete: true,
            should_warn,
            reason,
        }
    }
}

/// Configuration for link moderation behavior.
///
/// Loaded once at startup from the environment and immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Channels under link restriction.
    pub restricted_channel_ids: HashSet<u64>,
    /// Users allowed to run the bulk sweep command. This is deliberately
    /// separate from the administrator exemption: channel administrators do
    /// not get sweep rights implicitly, and vice versa.
    pub privileged_user_ids: HashSet<u64>,
    /// How long a (channel, author) pair stays exempt from repeat warnings
    /// after a warning fires.
    pub warning_cooldown_ms: u64,
    /// How long an emitted warning lives before it is retracted.
    pub warning_lifetime_ms: u64,
    /// Pause between sweep deletions to respect platform rate limits.
    pub sweep_delete_delay_ms: u64,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            restricted_channel_ids: HashSet::new(),
            privileged_user_ids: HashSet::new(),
            warning_cooldown_ms: 5_000,
            warning_lifetime_ms: 5_000,
            sweep_delete_delay_ms: 300,
        }
    }
}

/// Parse a comma-separated id list ("123, 456") into a set.
/// Junk entries are skipped rather than failing startup.
pub fn parse_id_csv(raw: &str) -> HashSet<u64> {
    raw.split(',')
        .filter_map(|part| part.trim().parse::<u64>().ok())
        .collect()
}

/// Summary of one retroactive sweep run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// How many fetched messages were evaluated.
    pub scanned: usize,
    /// Deletions that succeeded (or turned out to be already gone).
    pub deleted: usize,
    /// Deletions that failed and were skipped.
    pub failed: usize,
}
