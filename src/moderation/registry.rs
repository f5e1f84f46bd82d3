use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use log::{debug, error, info, warn};
use tokio::sync::Mutex;

use crate::filter::CheckResult;
use crate::moderation::ban_event::BanEvent;
use crate::moderation::errors::{CancelError, RegistryError};
use crate::moderation::{BanState, ModerationActions};
use crate::storage::StorageClient;
use crate::twitch::api::ApiError;

const MODERATION_REASON: &str = "Spam bot filtered, contact a mod if this was a mistake";

/// Owns every currently pending [`BanEvent`], keyed by the subject's
/// display name. At most one event can be pending per subject; the first
/// registration wins.
///
/// Registration issues the interim timeout immediately and arms the grace
/// timer. The timer task and `cancel` both take the registry lock and
/// re-check the cancellation token there, so firing and cancellation are
/// serialized and can never both act on the same event.
pub struct BanEventRegistry {
    events: Arc<Mutex<HashMap<String, BanEvent>>>,
    moderator: Arc<dyn ModerationActions>,
    storage: Option<Arc<StorageClient>>,
    grace_period: Duration,
}

impl BanEventRegistry {
    pub fn new(
        moderator: Arc<dyn ModerationActions>,
        grace_period: Duration,
        storage: Option<Arc<StorageClient>>,
    ) -> Self {
        BanEventRegistry {
            events: Arc::new(Mutex::new(HashMap::new())),
            moderator,
            storage,
            grace_period,
        }
    }

    /// Registers a new ban event for the flagged message: times the subject
    /// out right away and arms the grace timer that will ban them unless
    /// the event is canceled first.
    pub async fn register(&self, check_result: CheckResult) -> Result<(), RegistryError> {
        let name = check_result.event.user_name.clone();
        let user_id = check_result.event.user_id.clone();
        let channel = check_result.event.channel.clone();

        let mut events = self.events.lock().await;
        if events.contains_key(&name) {
            warn!("User {} is already in the ban events", name);
            return Err(RegistryError::DuplicateRegistration(name));
        }

        info!(
            "Started {}m ban event timer for user {}",
            self.grace_period.as_secs() / 60,
            name
        );

        // Interim restraining action, issued before the timer is armed
        match self
            .moderator
            .timeout_user(&user_id, self.grace_period, MODERATION_REASON)
            .await
        {
            Ok(()) => {}
            Err(ApiError::AlreadyApplied) => debug!("User {} is already timed out", name),
            Err(e) => error!(
                "Failed to time out {}: {} (left for manual follow-up)",
                name, e
            ),
        }

        let mut event = BanEvent::new(check_result);
        let token = event.arm();

        let events_ref = Arc::clone(&self.events);
        let moderator = Arc::clone(&self.moderator);
        let storage = self.storage.clone();
        let grace = self.grace_period;
        let key = name.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Ban timer for user {} canceled before expiry", key);
                    return;
                }
                _ = tokio::time::sleep(grace) => {}
            }

            // The grace period elapsed. Re-check under the registry lock: a
            // cancel that won the race has already removed the event.
            let mut events = events_ref.lock().await;
            if token.is_cancelled() {
                debug!("Ban timer for user {} elapsed but the event was canceled", key);
                return;
            }
            let event = match events.remove(&key) {
                Some(event) => event,
                None => {
                    debug!("No pending ban event for user {}, nothing to finalize", key);
                    return;
                }
            };

            info!("Executing ban on {}", key);
            let result = moderator
                .ban_user(event.subject_id(), MODERATION_REASON)
                .await;
            match &result {
                Ok(()) | Err(ApiError::AlreadyApplied) => {
                    if result.is_err() {
                        debug!("User {} was already banned", key);
                    }
                    if let Some(storage) = &storage {
                        if let Err(e) = storage.record_ban_transition(
                            event.subject_id(),
                            &key,
                            &event.check_result.event.channel,
                            BanState::Fired,
                        ) {
                            warn!("Failed to record ban transition for {}: {}", key, e);
                        }
                    }
                }
                Err(e) => error!(
                    "Unexpected error banning {}: {} (left for manual follow-up)",
                    key, e
                ),
            }
        });

        events.insert(name.clone(), event);

        if let Some(storage) = &self.storage {
            if let Err(e) =
                storage.record_ban_transition(&user_id, &name, &channel, BanState::Pending)
            {
                warn!("Failed to record ban transition for {}: {}", name, e);
            }
        }

        Ok(())
    }

    /// Cancels the pending ban event for the named subject and reverses the
    /// interim timeout.
    pub async fn cancel(&self, name: &str) -> Result<(), CancelError> {
        let mut events = self.events.lock().await;
        let event = match events.remove(name) {
            Some(event) => event,
            None => {
                warn!("No open ban event for user {} found", name);
                return Err(CancelError::NotRegistered(name.to_string()));
            }
        };

        if let Err(e) = event.cancel() {
            // Leave the event in place; the conflict is surfaced to the caller
            events.insert(name.to_string(), event);
            return Err(e);
        }
        warn!("Canceling ban on {}", name);

        match self.moderator.unban_user(event.subject_id()).await {
            Ok(()) => {}
            Err(ApiError::AlreadyApplied) => {
                debug!("Timeout on {} was already lifted", name)
            }
            Err(e) => error!(
                "Failed to lift the timeout on {}: {} (left for manual follow-up)",
                name, e
            ),
        }

        if let Some(storage) = &self.storage {
            if let Err(e) = storage.record_ban_transition(
                event.subject_id(),
                name,
                &event.check_result.event.channel,
                BanState::Canceled,
            ) {
                warn!("Failed to record ban transition for {}: {}", name, e);
            }
        }

        Ok(())
    }

    /// Read-only snapshot of the subjects with a pending ban event.
    pub async fn pending_subjects(&self) -> Vec<String> {
        self.events.lock().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{CheckOutcome, CheckResult};
    use crate::twitch::models::{ChatEvent, FollowStatus};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex as StdMutex;

    struct MockModerator {
        calls: StdMutex<Vec<String>>,
        ban_already_applied: bool,
    }

    impl MockModerator {
        fn new() -> Arc<Self> {
            Arc::new(MockModerator {
                calls: StdMutex::new(Vec::new()),
                ban_already_applied: false,
            })
        }

        fn with_ban_already_applied() -> Arc<Self> {
            Arc::new(MockModerator {
                calls: StdMutex::new(Vec::new()),
                ban_already_applied: true,
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ModerationActions for MockModerator {
        async fn timeout_user(
            &self,
            user_id: &str,
            _duration: Duration,
            _reason: &str,
        ) -> Result<(), ApiError> {
            self.calls.lock().unwrap().push(format!("timeout:{}", user_id));
            Ok(())
        }

        async fn ban_user(&self, user_id: &str, _reason: &str) -> Result<(), ApiError> {
            self.calls.lock().unwrap().push(format!("ban:{}", user_id));
            if self.ban_already_applied {
                Err(ApiError::AlreadyApplied)
            } else {
                Ok(())
            }
        }

        async fn unban_user(&self, user_id: &str) -> Result<(), ApiError> {
            self.calls.lock().unwrap().push(format!("unban:{}", user_id));
            Ok(())
        }
    }

    fn flagged(name: &str, user_id: &str) -> CheckResult {
        CheckResult {
            checker_name: String::from("test-filter"),
            event: ChatEvent {
                user_id: user_id.to_string(),
                user_login: name.to_lowercase(),
                user_name: name.to_string(),
                channel: String::from("somechannel"),
                content: String::from("spamword"),
                is_broadcaster: false,
                is_mod: false,
                is_vip: false,
                is_subscriber: false,
                first_message: false,
                follow: FollowStatus::Unknown,
                timestamp: Utc::now(),
            },
            outcome: CheckOutcome::Match,
            ignore_reason: None,
            score: 5.0,
        }
    }

    const GRACE: Duration = Duration::from_secs(120);

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn registration_times_out_then_bans_at_expiry() {
        let moderator = MockModerator::new();
        let registry = BanEventRegistry::new(moderator.clone(), GRACE, None);

        registry.register(flagged("Suspect", "42")).await.unwrap();
        assert_eq!(moderator.calls(), vec!["timeout:42"]);
        assert_eq!(registry.pending_subjects().await, vec!["Suspect"]);

        // Let the spawned grace timer register its sleep under the paused
        // clock before we advance past it.
        settle().await;
        tokio::time::advance(GRACE + Duration::from_secs(1)).await;
        settle().await;

        assert_eq!(moderator.calls(), vec!["timeout:42", "ban:42"]);
        assert!(registry.pending_subjects().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_expiry_prevents_the_ban_and_lifts_the_timeout() {
        let moderator = MockModerator::new();
        let registry = BanEventRegistry::new(moderator.clone(), GRACE, None);

        registry.register(flagged("Suspect", "42")).await.unwrap();
        registry.cancel("Suspect").await.unwrap();
        assert_eq!(moderator.calls(), vec!["timeout:42", "unban:42"]);

        // Even long after the grace period the ban must never run
        tokio::time::advance(GRACE * 10).await;
        settle().await;
        assert_eq!(moderator.calls(), vec!["timeout:42", "unban:42"]);
    }

    #[tokio::test(start_paused = true)]
    async fn second_cancel_is_rejected() {
        let moderator = MockModerator::new();
        let registry = BanEventRegistry::new(moderator.clone(), GRACE, None);

        registry.register(flagged("Suspect", "42")).await.unwrap();
        registry.cancel("Suspect").await.unwrap();
        assert!(matches!(
            registry.cancel("Suspect").await,
            Err(CancelError::NotRegistered(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_registration_is_rejected_and_first_wins() {
        let moderator = MockModerator::new();
        let registry = BanEventRegistry::new(moderator.clone(), GRACE, None);

        registry.register(flagged("Suspect", "42")).await.unwrap();
        let err = registry.register(flagged("Suspect", "42")).await;
        assert!(matches!(
            err,
            Err(RegistryError::DuplicateRegistration(_))
        ));

        // Let the spawned grace timer register its sleep under the paused
        // clock before we advance past it.
        settle().await;
        tokio::time::advance(GRACE + Duration::from_secs(1)).await;
        settle().await;

        // Exactly one interim timeout and one ban
        assert_eq!(moderator.calls(), vec!["timeout:42", "ban:42"]);
    }

    #[tokio::test(start_paused = true)]
    async fn already_banned_is_treated_as_success() {
        let moderator = MockModerator::with_ban_already_applied();
        let registry = BanEventRegistry::new(moderator.clone(), GRACE, None);

        registry.register(flagged("Suspect", "42")).await.unwrap();
        // Let the spawned grace timer register its sleep under the paused
        // clock before we advance past it.
        settle().await;
        tokio::time::advance(GRACE + Duration::from_secs(1)).await;
        settle().await;

        assert!(registry.pending_subjects().await.is_empty());
        assert_eq!(moderator.calls(), vec!["timeout:42", "ban:42"]);
    }

    #[tokio::test(start_paused = true)]
    async fn independent_subjects_run_independent_timers() {
        let moderator = MockModerator::new();
        let registry = BanEventRegistry::new(moderator.clone(), GRACE, None);

        registry.register(flagged("First", "1")).await.unwrap();
        registry.register(flagged("Second", "2")).await.unwrap();
        registry.cancel("First").await.unwrap();

        // Let the spawned grace timers register their sleeps under the paused
        // clock before we advance past them.
        settle().await;
        tokio::time::advance(GRACE + Duration::from_secs(1)).await;
        settle().await;

        let calls = moderator.calls();
        assert!(calls.contains(&String::from("ban:2")));
        assert!(!calls.contains(&String::from("ban:1")));
    }
}
