// Sweep coordinator - retroactive link cleanup across recent channel
// history. Reuses the policy engine's cooldown-free path; the warning
// ledger is deliberately never consulted here (clean-slate semantics,
// distinct from live moderation).

use super::gateway::{ChannelGateway, GatewayError};
use super::moderation_models::SweepReport;
use super::moderation_service::ModerationService;
use dashmap::DashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Bounds for one sweep batch.
pub const SWEEP_MIN_COUNT: u32 = 1;
pub const SWEEP_MAX_COUNT: u32 = 100;

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("user {0} is not authorized to run a sweep")]
    Unauthorized(u64),

    #[error(
        "sweep count must be between {min} and {max}, got {0}",
        min = SWEEP_MIN_COUNT,
        max = SWEEP_MAX_COUNT
    )]
    InvalidCount(u32),

    #[error("a sweep is already running in channel {0}")]
    AlreadyRunning(u64),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Runs bounded retroactive sweeps, at most one at a time per channel.
pub struct SweepCoordinator {
    moderation: Arc<ModerationService>,
    /// Channels with a sweep in flight; guards against duplicate-delete races.
    in_flight: DashSet<u64>,
}

impl SweepCoordinator {
    pub fn new(moderation: Arc<ModerationService>) -> Self {
        Self {
            moderation,
            in_flight: DashSet::new(),
        }
    }

    /// Scan up to `count` recent messages in the channel and delete every
    /// qualifying link message. Authorization and bounds are checked before
    /// any platform access happens.
    pub async fn sweep<G: ChannelGateway>(
        &self,
        gateway: &G,
        channel_id: u64,
        requester_id: u64,
        count: u32,
    ) -> Result<SweepReport, SweepError> {
        if !self.moderation.is_sweep_authorized(requester_id) {
            return Err(SweepError::Unauthorized(requester_id));
        }

        if !(SWEEP_MIN_COUNT..=SWEEP_MAX_COUNT).contains(&count) {
            return Err(SweepError::InvalidCount(count));
        }

        if !self.in_flight.insert(channel_id) {
            return Err(SweepError::AlreadyRunning(channel_id));
        }

        let outcome = self.run(gateway, channel_id, count).await;
        self.in_flight.remove(&channel_id);
        outcome
    }

    async fn run<G: ChannelGateway>(
        &self,
        gateway: &G,
        channel_id: u64,
        count: u32,
    ) -> Result<SweepReport, SweepError> {
        let batch = gateway.fetch_recent_messages(channel_id, count as u8).await?;
        let delay = Duration::from_millis(self.moderation.config().sweep_delete_delay_ms);

        let mut deleted = 0;
        let mut failed = 0;

        for event in &batch {
            let decision = self.moderation.decide_for_sweep(event);
            if !decision.should_delete {
                continue;
            }

            match gateway.delete_message(channel_id, event.message_id).await {
                // Already gone counts as done; someone else beat us to it.
                Ok(()) | Err(GatewayError::NotFound) => deleted += 1,
                Err(err) => {
                    tracing::warn!(
                        message_id = event.message_id,
                        "Skipping failed sweep deletion: {err}"
                    );
                    failed += 1;
                }
            }

            // Pace deletions so a large sweep doesn't trip platform rate limits.
            tokio::time::sleep(delay).await;
        }

        Ok(SweepReport {
            scanned: batch.len(),
            deleted,
            failed,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::moderation_models::{
        ActorRole, DecisionReason, MessageEvent, ModerationConfig,
    };
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashSet;
    use std::sync::Mutex;

    const CHANNEL: u64 = 100;
    const OTHER_CHANNEL: u64 = 200;
    const REQUESTER: u64 = 9;
    const USER: u64 = 1;

    /// In-memory gateway for testing.
    struct MockGateway {
        batch: Vec<MessageEvent>,
        deleted: Mutex<Vec<u64>>,
        fetches: Mutex<u32>,
        fail_ids: HashSet<u64>,
        gone_ids: HashSet<u64>,
        fail_fetch: bool,
    }

    impl MockGateway {
        fn with_batch(batch: Vec<MessageEvent>) -> Self {
            Self {
                batch,
                deleted: Mutex::new(Vec::new()),
                fetches: Mutex::new(0),
                fail_ids: HashSet::new(),
                gone_ids: HashSet::new(),
                fail_fetch: false,
            }
        }

        fn deleted_ids(&self) -> Vec<u64> {
            self.deleted.lock().unwrap().clone()
        }

        fn fetch_count(&self) -> u32 {
            *self.fetches.lock().unwrap()
        }
    }

    #[async_trait]
    impl ChannelGateway for MockGateway {
        async fn fetch_recent_messages(
            &self,
            _channel_id: u64,
            limit: u8,
        ) -> Result<Vec<MessageEvent>, GatewayError> {
            *self.fetches.lock().unwrap() += 1;
            if self.fail_fetch {
                return Err(GatewayError::Platform("fetch failed".to_string()));
            }
            Ok(self.batch.iter().take(limit as usize).cloned().collect())
        }

        async fn delete_message(
            &self,
            _channel_id: u64,
            message_id: u64,
        ) -> Result<(), GatewayError> {
            if self.gone_ids.contains(&message_id) {
                return Err(GatewayError::NotFound);
            }
            if self.fail_ids.contains(&message_id) {
                return Err(GatewayError::RateLimited);
            }
            self.deleted.lock().unwrap().push(message_id);
            Ok(())
        }

        async fn send_message(&self, _channel_id: u64, _text: &str) -> Result<u64, GatewayError> {
            Ok(0)
        }
    }

    fn test_config() -> ModerationConfig {
        ModerationConfig {
            restricted_channel_ids: HashSet::from([CHANNEL]),
            privileged_user_ids: HashSet::from([REQUESTER]),
            sweep_delete_delay_ms: 0,
            ..Default::default()
        }
    }

    fn coordinator() -> (Arc<ModerationService>, SweepCoordinator) {
        let service = Arc::new(ModerationService::new(test_config()));
        let sweeps = SweepCoordinator::new(Arc::clone(&service));
        (service, sweeps)
    }

    fn link_message(id: u64) -> MessageEvent {
        MessageEvent {
            message_id: id,
            channel_id: CHANNEL,
            author_id: USER,
            is_bot_author: false,
            body: format!("spam http://x.com/{id}"),
            actor_role: ActorRole::default(),
        }
    }

    fn plain_message(id: u64) -> MessageEvent {
        MessageEvent {
            body: "just chatting".to_string(),
            ..link_message(id)
        }
    }

    #[tokio::test]
    async fn unauthorized_requesters_never_touch_the_platform() {
        let (_, sweeps) = coordinator();
        let gateway = MockGateway::with_batch(vec![link_message(1)]);

        let err = sweeps.sweep(&gateway, CHANNEL, 777, 10).await.unwrap_err();

        assert!(matches!(err, SweepError::Unauthorized(777)));
        assert_eq!(gateway.fetch_count(), 0);
        assert!(gateway.deleted_ids().is_empty());
    }

    #[tokio::test]
    async fn out_of_range_counts_are_rejected_before_fetching() {
        let (_, sweeps) = coordinator();
        let gateway = MockGateway::with_batch(vec![link_message(1)]);

        for count in [0, 101] {
            let err = sweeps
                .sweep(&gateway, CHANNEL, REQUESTER, count)
                .await
                .unwrap_err();
            assert!(matches!(err, SweepError::InvalidCount(c) if c == count));
        }

        assert_eq!(gateway.fetch_count(), 0);
    }

    #[tokio::test]
    async fn sweep_deletes_only_qualifying_messages() {
        let (_, sweeps) = coordinator();

        let mut bot = link_message(2);
        bot.is_bot_author = true;
        let mut admin = link_message(3);
        admin.actor_role = ActorRole {
            is_administrator: true,
        };

        let gateway = MockGateway::with_batch(vec![
            link_message(1),
            bot,
            admin,
            plain_message(4),
            link_message(5),
        ]);

        let report = sweeps.sweep(&gateway, CHANNEL, REQUESTER, 10).await.unwrap();

        assert_eq!(report.scanned, 5);
        assert_eq!(report.deleted, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(gateway.deleted_ids(), vec![1, 5]);
    }

    #[tokio::test]
    async fn sweep_scans_at_most_the_requested_count() {
        let (_, sweeps) = coordinator();
        let gateway = MockGateway::with_batch((1..=15).map(link_message).collect());

        let report = sweeps.sweep(&gateway, CHANNEL, REQUESTER, 10).await.unwrap();

        assert_eq!(report.scanned, 10);
        assert_eq!(report.deleted, 10);
    }

    #[tokio::test]
    async fn failed_deletions_are_skipped_not_fatal() {
        let (_, sweeps) = coordinator();
        let mut gateway =
            MockGateway::with_batch(vec![link_message(1), link_message(2), link_message(3)]);
        gateway.fail_ids = HashSet::from([2]);

        let report = sweeps.sweep(&gateway, CHANNEL, REQUESTER, 10).await.unwrap();

        assert_eq!(report.deleted, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(gateway.deleted_ids(), vec![1, 3]);
    }

    #[tokio::test]
    async fn already_gone_messages_count_as_deleted() {
        let (_, sweeps) = coordinator();
        let mut gateway = MockGateway::with_batch(vec![link_message(1), link_message(2)]);
        gateway.gone_ids = HashSet::from([1]);

        let report = sweeps.sweep(&gateway, CHANNEL, REQUESTER, 10).await.unwrap();

        assert_eq!(report.deleted, 2);
        assert_eq!(report.failed, 0);
        // Only one deletion actually reached the platform.
        assert_eq!(gateway.deleted_ids(), vec![2]);
    }

    #[tokio::test]
    async fn sweep_never_touches_the_warning_ledger() {
        let (service, sweeps) = coordinator();
        let gateway = MockGateway::with_batch(vec![link_message(1)]);

        sweeps.sweep(&gateway, CHANNEL, REQUESTER, 10).await.unwrap();

        // A live offense from the swept author right afterwards still gets
        // a fresh warning: the sweep recorded nothing.
        let live = service.decide(&link_message(99), Utc::now());
        assert_eq!(live.reason, DecisionReason::DeletedWithWarning);
    }

    #[tokio::test]
    async fn concurrent_sweeps_of_one_channel_are_rejected() {
        let (_, sweeps) = coordinator();
        let gateway = MockGateway::with_batch(vec![]);

        sweeps.in_flight.insert(CHANNEL);

        let err = sweeps
            .sweep(&gateway, CHANNEL, REQUESTER, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, SweepError::AlreadyRunning(c) if c == CHANNEL));

        // A different channel is unaffected.
        assert!(sweeps.sweep(&gateway, OTHER_CHANNEL, REQUESTER, 10).await.is_ok());
    }

    #[tokio::test]
    async fn fetch_failure_releases_the_channel_guard() {
        let (_, sweeps) = coordinator();
        let mut gateway = MockGateway::with_batch(vec![]);
        gateway.fail_fetch = true;

        let err = sweeps
            .sweep(&gateway, CHANNEL, REQUESTER, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, SweepError::Gateway(_)));
        assert!(sweeps.in_flight.is_empty());
    }

    #[tokio::test]
    async fn back_to_back_sweeps_are_allowed() {
        let (_, sweeps) = coordinator();
        let gateway = MockGateway::with_batch(vec![link_message(1)]);

        assert!(sweeps.sweep(&gateway, CHANNEL, REQUESTER, 10).await.is_ok());
        assert!(sweeps.sweep(&gateway, CHANNEL, REQUESTER, 10).await.is_ok());
    }
}
