use tokio_util::sync::CancellationToken;

use crate::filter::CheckResult;
use crate::moderation::errors::CancelError;

/// A pending timeout-then-ban for one flagged chatter.
///
/// The token is the single source of truth for cancellation: the grace
/// timer re-checks it under the registry lock before finalizing, so a
/// cancel and a firing timer can never both act on the same event.
pub struct BanEvent {
    pub check_result: CheckResult,
    token: CancellationToken,
    armed: bool,
}

impl BanEvent {
    pub fn new(check_result: CheckResult) -> Self {
        BanEvent {
            check_result,
            token: CancellationToken::new(),
            armed: false,
        }
    }

    pub fn subject_name(&self) -> &str {
        &self.check_result.event.user_name
    }

    pub fn subject_id(&self) -> &str {
        &self.check_result.event.user_id
    }

    /// Marks the grace timer as started. Called by the registry when it
    /// spawns the timer task.
    pub fn arm(&mut self) -> CancellationToken {
        self.armed = true;
        self.token.clone()
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Cancels the pending ban. Fails if the timer was never armed or the
    /// event was already canceled.
    pub fn cancel(&self) -> Result<(), CancelError> {
        if !self.armed {
            Err(CancelError::NotArmed(self.subject_name().to_string()))
        } else if self.token.is_cancelled() {
            Err(CancelError::AlreadyCanceled(self.subject_name().to_string()))
        } else {
            self.token.cancel();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{CheckOutcome, CheckResult};
    use crate::twitch::models::{ChatEvent, FollowStatus};
    use chrono::Utc;

    fn flagged_result(name: &str) -> CheckResult {
        CheckResult {
            checker_name: String::from("test-filter"),
            event: ChatEvent {
                user_id: String::from("42"),
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

    #[test]
    fn cancel_before_arming_is_a_conflict() {
        let event = BanEvent::new(flagged_result("Suspect"));
        assert!(!event.is_armed());
        assert!(matches!(event.cancel(), Err(CancelError::NotArmed(_))));
    }

    #[test]
    fn second_cancel_is_a_conflict() {
        let mut event = BanEvent::new(flagged_result("Suspect"));
        let token = event.arm();
        assert!(event.cancel().is_ok());
        assert!(token.is_cancelled());
        assert!(matches!(
            event.cancel(),
            Err(CancelError::AlreadyCanceled(_))
        ));
    }
}
