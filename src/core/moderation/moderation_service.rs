// Link moderation service - core business logic for the link policy.
//
// This service decides, for every observed message event, whether to delete
// it and whether to emit a transient warning. Deletion is unconditional once
// a link from a non-privileged actor lands in a restricted channel; the
// cooldown only governs whether the user-facing warning re-fires.
//
// NO Discord dependencies here - just pure domain logic.

use super::moderation_models::{
    ActorRole, DecisionReason, MessageEvent, ModerationConfig, ModerationDecision,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;

// ============================================================================
// LINK DETECTOR
// ============================================================================

/// Does the body contain at least one URL-like token?
///
/// Detection is case-insensitive. The text is rescanned from the start on
/// every call; no scan position is retained between calls.
pub fn contains_link(body: &str) -> bool {
    let lowered = body.to_lowercase();
    scheme_token_present(&lowered, "http://")
        || scheme_token_present(&lowered, "https://")
        || bare_www_token_present(&lowered)
}

/// A scheme marker counts only when at least one non-whitespace character
/// follows it.
fn scheme_token_present(text: &str, marker: &str) -> bool {
    let mut offset = 0;
    while let Some(pos) = text[offset..].find(marker) {
        let after = offset + pos + marker.len();
        if text[after..]
            .chars()
            .next()
            .map(|c| !c.is_whitespace())
            .unwrap_or(false)
        {
            return true;
        }
        offset = after;
    }
    false
}

/// A bare `www.` token counts only at a word start, so "awww.cute" is not a
/// link, while "(www.example.com)" is.
fn bare_www_token_present(text: &str) -> bool {
    let mut offset = 0;
    while let Some(pos) = text[offset..].find("www.") {
        let start = offset + pos;
        let at_word_start = text[..start]
            .chars()
            .next_back()
            .map(|c| !c.is_alphanumeric())
            .unwrap_or(true);
        let after = start + "www.".len();
        let has_host = text[after..]
            .chars()
            .next()
            .map(|c| !c.is_whitespace())
            .unwrap_or(false);
        if at_word_start && has_host {
            return true;
        }
        offset = after;
    }
    false
}

// ============================================================================
// ROLE CLASSIFIER
// ============================================================================

/// Moderation exemption: administrators only.
///
/// Sweep authorization is a separate allow-list check
/// (`ModerationService::is_sweep_authorized`); the two are never merged.
pub fn is_privileged_actor(role: ActorRole) -> bool {
    role.is_administrator
}

// ============================================================================
// COOLDOWN LEDGER
// ============================================================================

/// Last warning time per (channel, author) pair.
///
/// A key's value only ever moves forward in time while present. The ledger
/// is cleared wholesale on a fixed interval rather than expiring per key;
/// the clear exists to bound memory, not to guarantee warning cadence.
pub struct CooldownLedger {
    warned_at: DashMap<(u64, u64), DateTime<Utc>>,
}

impl CooldownLedger {
    pub fn new() -> Self {
        Self {
            warned_at: DashMap::new(),
        }
    }

    /// Was a warning recorded for this key within `window_ms` of `now`?
    pub fn is_on_cooldown(
        &self,
        channel_id: u64,
        author_id: u64,
        window_ms: u64,
        now: DateTime<Utc>,
    ) -> bool {
        self.warned_at
            .get(&(channel_id, author_id))
            .map(|last| {
                now.signed_duration_since(*last) < chrono::Duration::milliseconds(window_ms as i64)
            })
            .unwrap_or(false)
    }

    /// Store or overwrite the warning timestamp for this key.
    pub fn record_warning(&self, channel_id: u64, author_id: u64, now: DateTime<Utc>) {
        self.warned_at.insert((channel_id, author_id), now);
    }

    /// Full-table clear. Returns how many entries were evicted.
    pub fn clear(&self) -> usize {
        let evicted = self.warned_at.len();
        self.warned_at.clear();
        evicted
    }
}

impl Default for CooldownLedger {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// The link moderation policy engine.
///
/// Owns the immutable config and the mutable cooldown ledger; the Discord
/// layer feeds it normalized `MessageEvent`s and enacts the decisions.
pub struct ModerationService {
    config: ModerationConfig,
    ledger: CooldownLedger,
}

impl ModerationService {
    pub fn new(config: ModerationConfig) -> Self {
        Self {
            config,
            ledger: CooldownLedger::new(),
        }
    }

    pub fn config(&self) -> &ModerationConfig {
        &self.config
    }

    /// Decide what to do with one message-create or message-edit event.
    ///
    /// Evaluation order is strict; the first matching terminal state wins:
    /// bot author, unrestricted channel, no link, privileged actor, delete.
    /// Only the delete state consults (and possibly updates) the ledger.
    /// Edits go through the exact same path as new messages.
    pub fn decide(&self, event: &MessageEvent, now: DateTime<Utc>) -> ModerationDecision {
        if event.is_bot_author {
            return ModerationDecision::keep(DecisionReason::BotAuthor);
        }

        if !self.config.restricted_channel_ids.contains(&event.channel_id) {
            return ModerationDecision::keep(DecisionReason::NotRestrictedChannel);
        }

        if !contains_link(&event.body) {
            return ModerationDecision::keep(DecisionReason::NoLinkFound);
        }

        if is_privileged_actor(event.actor_role) {
            return ModerationDecision::keep(DecisionReason::PrivilegedActor);
        }

        // Deletion is now mandatory; the ledger only decides whether the
        // author gets another warning.
        if self.ledger.is_on_cooldown(
            event.channel_id,
            event.author_id,
            self.config.warning_cooldown_ms,
            now,
        ) {
            return ModerationDecision::delete(DecisionReason::DeletedNoWarnCooldown, false);
        }

        self.ledger.record_warning(event.channel_id, event.author_id, now);
        ModerationDecision::delete(DecisionReason::DeletedWithWarning, true)
    }

    /// Cooldown-free evaluation used by the retroactive sweep: link presence
    /// and administrator privilege only. The ledger is never consulted.
    pub fn decide_for_sweep(&self, event: &MessageEvent) -> ModerationDecision {
        if event.is_bot_author {
            return ModerationDecision::keep(DecisionReason::BotAuthor);
        }

        if !contains_link(&event.body) {
            return ModerationDecision::keep(DecisionReason::NoLinkFound);
        }

        if is_privileged_actor(event.actor_role) {
            return ModerationDecision::keep(DecisionReason::PrivilegedActor);
        }

        ModerationDecision::delete(DecisionReason::Deleted, false)
    }

    /// Sweep-command authorization: explicit allow-list membership, not the
    /// administrator capability.
    pub fn is_sweep_authorized(&self, requester_id: u64) -> bool {
        self.config.privileged_user_ids.contains(&requester_id)
    }

    /// Periodic full clear of the warning cooldown ledger.
    pub fn clear_cooldowns(&self) -> usize {
        self.ledger.clear()
    }
}

// ============================================================================
// TESTS
// ============================================================================
